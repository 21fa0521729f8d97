use reqsync_delta::DeltaError;
use reqsync_types::ContentHash;

/// Errors from drivers and the object store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ContentHash),

    /// Content read back does not hash to its address.
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        expected: ContentHash,
        computed: ContentHash,
    },

    /// The stored frame is malformed or of the wrong kind.
    #[error("corrupt object at {key}: {reason}")]
    CorruptObject { key: String, reason: String },

    /// The driver refuses a key (empty, absolute, or escaping its root).
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// A delta chain is longer than the configured maximum.
    #[error("delta chain for {hash} exceeds {max} links")]
    DeltaChainTooDeep { hash: ContentHash, max: usize },

    /// A stored delta could not be applied.
    #[error("delta error: {0}")]
    Delta(#[from] DeltaError),

    /// Store options out of range.
    #[error("invalid store options: {0}")]
    InvalidOptions(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

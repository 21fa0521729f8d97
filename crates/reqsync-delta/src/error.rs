/// Errors from computing or applying a delta script.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeltaError {
    /// Chunk size must be at least one byte.
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    /// A copy operation reaches outside the source buffer.
    #[error("copy out of bounds: offset {offset} + len {len} exceeds source length {source_len}")]
    CopyOutOfBounds {
        offset: usize,
        len: usize,
        source_len: usize,
    },

    /// The script was computed against a source of a different length.
    #[error("source length mismatch: script expects {expected}, got {actual}")]
    SourceLengthMismatch { expected: usize, actual: usize },

    /// Replaying the script did not produce the recorded target length.
    #[error("target length mismatch: script declares {expected}, produced {actual}")]
    TargetLengthMismatch { expected: usize, actual: usize },

    /// The output could not be allocated.
    #[error("patched output of {0} bytes cannot be allocated")]
    OutputTooLarge(usize),

    /// Binary encoding or decoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result alias for delta operations.
pub type DeltaResult<T> = Result<T, DeltaError>;

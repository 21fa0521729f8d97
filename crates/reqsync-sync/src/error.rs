use reqsync_store::StoreError;
use reqsync_vcs::VcsError;

/// Errors from the document repository.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A record with this id already exists.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from reconciling a remote project.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The remote revoked access; message is shown to the user verbatim.
    #[error("You no longer have permission to {action} the \"{resource}\" collection.  Contact your team administrator if you think this is an error.")]
    PermissionDenied { action: String, resource: String },

    #[error("repository error: {0}")]
    Repository(#[from] RepoError),

    #[error("version control error: {0}")]
    Vcs(#[from] VcsError),
}

pub type SyncResult<T> = Result<T, SyncError>;

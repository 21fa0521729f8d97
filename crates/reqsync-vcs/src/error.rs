use reqsync_store::StoreError;
use reqsync_types::TypeError;

/// Errors from version-control operations.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// No backend project has been bound to this instance.
    #[error("no backend project set")]
    NoBackendProject,

    /// No metadata is stored for the requested project.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("invalid branch name {name:?}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    #[error("cannot delete the current branch: {0}")]
    DeleteCurrentBranch(String),

    /// Working documents with local edits would be overwritten.
    #[error("uncommitted changes would be overwritten: {}", .documents.join(", "))]
    UncommittedChanges { documents: Vec<String> },

    /// The document is not part of the current head.
    #[error("document not tracked: {0}")]
    NotTracked(String),

    /// Local and remote history have diverged.
    #[error("not a fast-forward update for branch {0}")]
    NotFastForward(String),

    /// The remote refused access to the project.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The remote could not be reached or failed internally.
    #[error("transport error: {0}")]
    Transport(String),

    /// Received history failed verification.
    #[error("invalid history: {0}")]
    InvalidHistory(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("document error: {0}")]
    Document(#[from] TypeError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for version-control operations.
pub type VcsResult<T> = Result<T, VcsError>;

impl From<serde_json::Error> for VcsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

//! Bringing remote reqsync projects into a local document repository.
//!
//! [`pull_backend_project`] drives any [`VersionControl`](reqsync_vcs::VersionControl)
//! implementation and writes through a [`DocumentRepository`].

pub mod error;
pub mod pull;
pub mod repository;

pub use error::{RepoError, RepoResult, SyncError, SyncResult};
pub use pull::{pull_backend_project, PullSummary, WorkspaceChange};
pub use repository::{DocumentRepository, DriverRepository};

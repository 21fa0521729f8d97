use async_trait::async_trait;

use reqsync_types::{BackendProject, Document};

use crate::error::VcsResult;
use crate::vcs::{CheckoutDelta, PullOutcome, Vcs};

/// The slice of version control that project reconciliation drives.
///
/// [`Vcs`] is the production implementation; reconciliation logic is written
/// against this trait so it can be exercised with recording doubles.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn set_backend_project(&mut self, project: &BackendProject) -> VcsResult<()>;

    async fn get_remote_branches(&self) -> VcsResult<Vec<String>>;

    async fn checkout(&mut self, documents: &[Document], branch: &str) -> VcsResult<CheckoutDelta>;

    async fn all_documents(&self) -> VcsResult<Vec<Document>>;

    async fn pull(&mut self, existing: &[Document], remote_project_id: &str) -> VcsResult<PullOutcome>;
}

#[async_trait]
impl VersionControl for Vcs {
    async fn set_backend_project(&mut self, project: &BackendProject) -> VcsResult<()> {
        Vcs::set_backend_project(self, project)
    }

    async fn get_remote_branches(&self) -> VcsResult<Vec<String>> {
        Vcs::get_remote_branches(self).await
    }

    async fn checkout(&mut self, documents: &[Document], branch: &str) -> VcsResult<CheckoutDelta> {
        Vcs::checkout(self, documents, branch)
    }

    async fn all_documents(&self) -> VcsResult<Vec<Document>> {
        Vcs::all_documents(self)
    }

    async fn pull(&mut self, existing: &[Document], remote_project_id: &str) -> VcsResult<PullOutcome> {
        Vcs::pull(self, existing, remote_project_id).await
    }
}

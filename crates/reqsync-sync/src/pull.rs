//! Reconcile a remote backend project into the local repository.

use tracing::{debug, info, warn};

use reqsync_types::{BackendProject, Project, Workspace, WorkspaceScope, DEFAULT_BRANCH_NAME};
use reqsync_vcs::{PullOutcome, VcsError, VersionControl};

use crate::error::{SyncError, SyncResult};
use crate::repository::DocumentRepository;

/// What happened to the root workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkspaceChange {
    Created,
    Corrected,
    Unchanged,
}

/// Result of [`pull_backend_project`].
#[derive(Clone, Debug)]
pub struct PullSummary {
    pub project: Project,
    pub project_created: bool,
    pub workspace: Workspace,
    pub workspace_change: WorkspaceChange,
    /// `None` when the remote had no branches and nothing was pulled.
    pub pulled: Option<PullOutcome>,
}

/// Bring `backend_project` into the local repository.
///
/// Binds the VCS to the project, finds or creates the local project linked
/// to the owning team, checks out the default branch, pulls when the remote
/// already has history, and makes sure the root workspace exists under the
/// local project with the remote name.
///
/// `remote_projects` are the local projects already linked to a team.
pub async fn pull_backend_project<V, R>(
    vcs: &mut V,
    backend_project: &BackendProject,
    remote_projects: &[Project],
    repo: &R,
) -> SyncResult<PullSummary>
where
    V: VersionControl + ?Sized,
    R: DocumentRepository + ?Sized,
{
    vcs.set_backend_project(backend_project).await?;

    let (project, project_created) = resolve_project(backend_project, remote_projects, repo).await?;
    let remote_id = project.remote_id.clone().unwrap_or_default();

    vcs.checkout(&[], DEFAULT_BRANCH_NAME).await?;

    let branches = vcs
        .get_remote_branches()
        .await
        .map_err(|e| intercept(e, backend_project))?;

    let pulled = if branches.is_empty() {
        debug!(project = %backend_project.id, "remote project has no branches");
        None
    } else {
        let existing = vcs.all_documents().await?;
        let outcome = vcs
            .pull(&existing, &remote_id)
            .await
            .map_err(|e| intercept(e, backend_project))?;
        for document in &outcome.upsert {
            repo.upsert_document(document.clone()).await?;
        }
        for id in &outcome.remove {
            repo.remove_document(id).await?;
        }
        Some(outcome)
    };

    let (workspace, workspace_change) = resolve_workspace(backend_project, &project, repo).await?;

    info!(
        project = %project.id,
        workspace = %workspace.id,
        project_created,
        workspace_change = ?workspace_change,
        pulled = pulled.is_some(),
        "backend project pulled"
    );
    Ok(PullSummary {
        project,
        project_created,
        workspace,
        workspace_change,
        pulled,
    })
}

async fn resolve_project<R: DocumentRepository + ?Sized>(
    backend_project: &BackendProject,
    remote_projects: &[Project],
    repo: &R,
) -> SyncResult<(Project, bool)> {
    let team = &backend_project.team;
    if let Some(project) = remote_projects
        .iter()
        .find(|p| p.remote_id.as_deref() == Some(team.id.as_str()))
    {
        return Ok((project.clone(), false));
    }
    if let Some(project) = repo.project_by_remote_id(&team.id).await? {
        return Ok((project, false));
    }
    let project = repo
        .create_project(Project::remote(&team.name, &team.id))
        .await?;
    info!(project = %project.id, team = %team.id, "created remote project");
    Ok((project, true))
}

async fn resolve_workspace<R: DocumentRepository + ?Sized>(
    backend_project: &BackendProject,
    project: &Project,
    repo: &R,
) -> SyncResult<(Workspace, WorkspaceChange)> {
    let root = &backend_project.root_document_id;
    match repo.get_workspace(root).await? {
        None => {
            let workspace = Workspace::with_id(root, &backend_project.name)
                .parented(&project.id)
                .scoped(WorkspaceScope::Collection);
            let workspace = repo.create_workspace(workspace).await?;
            Ok((workspace, WorkspaceChange::Created))
        }
        Some(mut workspace) => {
            let stale = workspace.name != backend_project.name
                || workspace.parent_id.as_deref() != Some(project.id.as_str());
            if !stale {
                return Ok((workspace, WorkspaceChange::Unchanged));
            }
            workspace.name = backend_project.name.clone();
            workspace.parent_id = Some(project.id.clone());
            let workspace = repo.update_workspace(workspace).await?;
            debug!(workspace = %workspace.id, "corrected workspace name and parent");
            Ok((workspace, WorkspaceChange::Corrected))
        }
    }
}

fn intercept(error: VcsError, backend_project: &BackendProject) -> SyncError {
    match error {
        VcsError::Unauthorized(reason) => {
            warn!(project = %backend_project.id, %reason, "remote refused pull");
            SyncError::PermissionDenied {
                action: "pull".into(),
                resource: backend_project.name.clone(),
            }
        }
        other => SyncError::Vcs(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use reqsync_store::{MemoryDriver, ObjectStore};
    use reqsync_types::{Document, Request, Team};
    use reqsync_vcs::{CheckoutDelta, CommitOutcome, StoreRemote, Vcs, VcsConfig, VcsResult};

    use crate::repository::DriverRepository;

    // -----------------------------------------------------------------------
    // Recording double
    // -----------------------------------------------------------------------

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        SetBackendProject(BackendProject),
        Checkout(Vec<Document>, String),
        GetRemoteBranches,
        AllDocuments,
        Pull(Vec<Document>, String),
    }

    enum BranchesReply {
        Names(Vec<String>),
        Unauthorized,
        Transport,
    }

    struct RecordingVcs {
        calls: Mutex<Vec<Call>>,
        branches: BranchesReply,
        documents: Vec<Document>,
        outcome: PullOutcome,
    }

    impl RecordingVcs {
        fn new(branches: BranchesReply) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                branches,
                documents: Vec::new(),
                outcome: PullOutcome::default(),
            }
        }

        fn with_documents(mut self, documents: Vec<Document>) -> Self {
            self.documents = documents;
            self
        }

        fn record(&self, call: Call) {
            self.calls.lock().expect("lock poisoned").push(call);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("lock poisoned").clone()
        }

        fn pulls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Pull(..)))
                .collect()
        }
    }

    #[async_trait]
    impl VersionControl for RecordingVcs {
        async fn set_backend_project(&mut self, project: &BackendProject) -> VcsResult<()> {
            self.record(Call::SetBackendProject(project.clone()));
            Ok(())
        }

        async fn get_remote_branches(&self) -> VcsResult<Vec<String>> {
            self.record(Call::GetRemoteBranches);
            match &self.branches {
                BranchesReply::Names(names) => Ok(names.clone()),
                BranchesReply::Unauthorized => Err(VcsError::Unauthorized("invalid access to project".into())),
                BranchesReply::Transport => Err(VcsError::Transport("connection reset".into())),
            }
        }

        async fn checkout(&mut self, documents: &[Document], branch: &str) -> VcsResult<CheckoutDelta> {
            self.record(Call::Checkout(documents.to_vec(), branch.to_string()));
            Ok(CheckoutDelta::default())
        }

        async fn all_documents(&self) -> VcsResult<Vec<Document>> {
            self.record(Call::AllDocuments);
            Ok(self.documents.clone())
        }

        async fn pull(&mut self, existing: &[Document], remote_project_id: &str) -> VcsResult<PullOutcome> {
            self.record(Call::Pull(existing.to_vec(), remote_project_id.to_string()));
            Ok(self.outcome.clone())
        }
    }

    fn team() -> Team {
        Team {
            id: "team_1".into(),
            name: "Platform".into(),
        }
    }

    fn backend_project() -> BackendProject {
        BackendProject {
            id: "prj_1".into(),
            name: "Petstore".into(),
            root_document_id: "wrk_1".into(),
            team: team(),
        }
    }

    fn repo() -> DriverRepository {
        DriverRepository::new(Arc::new(MemoryDriver::new()))
    }

    fn assert_always_bound_and_checked_out(vcs: &RecordingVcs) {
        let calls = vcs.calls();
        assert_eq!(calls[0], Call::SetBackendProject(backend_project()));
        assert!(calls.contains(&Call::Checkout(Vec::new(), DEFAULT_BRANCH_NAME.into())));
    }

    // -----------------------------------------------------------------------
    // New remote project
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn uses_existing_project_without_renaming() {
        let repo = repo();
        let existing = repo
            .create_project(Project::remote(format!("{} unique", team().name), &team().id))
            .await
            .unwrap();
        let mut vcs = RecordingVcs::new(BranchesReply::Names(Vec::new()));

        let summary = pull_backend_project(&mut vcs, &backend_project(), &[existing.clone()], &repo)
            .await
            .unwrap();

        assert!(!summary.project_created);
        let projects = repo.all_projects().await.unwrap();
        assert_eq!(projects, vec![existing.clone()]);
        assert_eq!(projects[0].name, "Platform unique");

        let workspaces = repo.all_workspaces().await.unwrap();
        assert_eq!(workspaces.len(), 1);
        let ws = &workspaces[0];
        assert_eq!(ws.id, "wrk_1");
        assert_eq!(ws.name, "Petstore");
        assert_eq!(ws.parent_id.as_deref(), Some(existing.id.as_str()));
        assert_eq!(ws.scope, WorkspaceScope::Collection);

        assert!(vcs.pulls().is_empty());
        assert_always_bound_and_checked_out(&vcs);
    }

    #[tokio::test]
    async fn inserts_project_and_parented_workspace() {
        let repo = repo();
        let mut vcs = RecordingVcs::new(BranchesReply::Names(Vec::new()));

        let summary = pull_backend_project(&mut vcs, &backend_project(), &[], &repo)
            .await
            .unwrap();

        assert!(summary.project_created);
        assert_eq!(summary.workspace_change, WorkspaceChange::Created);
        let projects = repo.all_projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Platform");
        assert_eq!(projects[0].remote_id.as_deref(), Some("team_1"));

        let workspaces = repo.all_workspaces().await.unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].id, "wrk_1");
        assert_eq!(workspaces[0].name, "Petstore");
        assert_eq!(workspaces[0].parent_id.as_deref(), Some(projects[0].id.as_str()));
        assert_eq!(workspaces[0].scope, WorkspaceScope::Collection);

        assert!(vcs.pulls().is_empty());
        assert_always_bound_and_checked_out(&vcs);
    }

    #[tokio::test]
    async fn corrects_stale_workspace_name_and_parent() {
        let repo = repo();
        repo.create_workspace(Workspace::with_id("wrk_1", "someName"))
            .await
            .unwrap();
        let mut vcs = RecordingVcs::new(BranchesReply::Names(Vec::new()));

        let summary = pull_backend_project(&mut vcs, &backend_project(), &[], &repo)
            .await
            .unwrap();

        assert_eq!(summary.workspace_change, WorkspaceChange::Corrected);
        let workspaces = repo.all_workspaces().await.unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].name, "Petstore");
        assert_eq!(workspaces[0].parent_id.as_deref(), Some(summary.project.id.as_str()));
        assert_always_bound_and_checked_out(&vcs);
    }

    #[tokio::test]
    async fn matching_workspace_is_left_alone() {
        let repo = repo();
        let project = repo
            .create_project(Project::remote("Platform", "team_1"))
            .await
            .unwrap();
        let ws = repo
            .create_workspace(Workspace::with_id("wrk_1", "Petstore").parented(&project.id))
            .await
            .unwrap();
        let mut vcs = RecordingVcs::new(BranchesReply::Names(Vec::new()));

        let summary = pull_backend_project(&mut vcs, &backend_project(), &[project], &repo)
            .await
            .unwrap();

        assert_eq!(summary.workspace_change, WorkspaceChange::Unchanged);
        assert_eq!(repo.get_workspace("wrk_1").await.unwrap(), Some(ws));
    }

    // -----------------------------------------------------------------------
    // Existing remote project
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn pulls_and_only_reparents_workspace() {
        let repo = repo();
        let project = repo
            .create_project(Project::remote("Platform", "team_1"))
            .await
            .unwrap();
        let ws = repo
            .create_workspace(Workspace::with_id("wrk_1", "Petstore").parented("proj_stale"))
            .await
            .unwrap();
        let request = repo.create_request(Request::new("wrk_1")).await.unwrap();
        let documents = vec![Document::from(ws.clone()), Document::from(request.clone())];
        let mut vcs = RecordingVcs::new(BranchesReply::Names(vec![DEFAULT_BRANCH_NAME.into()]))
            .with_documents(documents.clone());

        let summary = pull_backend_project(&mut vcs, &backend_project(), &[project.clone()], &repo)
            .await
            .unwrap();

        assert_eq!(
            vcs.pulls(),
            vec![Call::Pull(documents, "team_1".into())]
        );
        assert!(summary.pulled.is_some());

        let workspace = repo.get_workspace("wrk_1").await.unwrap().unwrap();
        assert_eq!(workspace.parent_id.as_deref(), Some(project.id.as_str()));
        assert_eq!(workspace.name, ws.name);
        assert_eq!(workspace.created, ws.created);
        assert_eq!(workspace.description, ws.description);

        assert_eq!(repo.all_requests().await.unwrap(), vec![request]);
        assert_always_bound_and_checked_out(&vcs);
    }

    #[tokio::test]
    async fn remote_branches_precede_pull() {
        let repo = repo();
        let mut vcs = RecordingVcs::new(BranchesReply::Names(vec!["master".into()]));
        pull_backend_project(&mut vcs, &backend_project(), &[], &repo)
            .await
            .unwrap();

        let calls = vcs.calls();
        let position = |wanted: fn(&Call) -> bool| calls.iter().position(wanted).unwrap();
        let checkout = position(|c| matches!(c, Call::Checkout(..)));
        let branches = position(|c| matches!(c, Call::GetRemoteBranches));
        let all = position(|c| matches!(c, Call::AllDocuments));
        let pull = position(|c| matches!(c, Call::Pull(..)));
        assert!(checkout < branches && branches < all && all < pull);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unauthorized_becomes_permission_error() {
        let repo = repo();
        let mut vcs = RecordingVcs::new(BranchesReply::Unauthorized);

        let err = pull_backend_project(&mut vcs, &backend_project(), &[], &repo)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "You no longer have permission to pull the \"Petstore\" collection.  \
             Contact your team administrator if you think this is an error."
        );
        assert!(vcs.pulls().is_empty());
        assert_always_bound_and_checked_out(&vcs);
    }

    #[tokio::test]
    async fn transport_failure_propagates_unchanged() {
        let repo = repo();
        let mut vcs = RecordingVcs::new(BranchesReply::Transport);

        let err = pull_backend_project(&mut vcs, &backend_project(), &[], &repo)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Vcs(VcsError::Transport(_))));
        assert!(vcs.pulls().is_empty());
    }

    // -----------------------------------------------------------------------
    // End to end
    // -----------------------------------------------------------------------

    fn replica(remote: Arc<StoreRemote>, author: &str) -> Vcs {
        let driver = Arc::new(MemoryDriver::new());
        Vcs::new(
            ObjectStore::new(driver.clone()),
            driver,
            remote,
            VcsConfig::with_author(author),
        )
    }

    #[tokio::test]
    async fn pulls_shared_history_into_fresh_replica() {
        let remote = Arc::new(StoreRemote::new(Arc::new(MemoryDriver::new())));
        remote.grant("team_1").unwrap();

        let ws = Workspace::with_id("wrk_1", "Petstore");
        let request = Request::new("wrk_1")
            .named("List pets")
            .with_url("GET", "https://example.com/pets");
        let mut alice = replica(remote.clone(), "alice");
        alice.set_backend_project(&backend_project()).unwrap();
        alice.checkout(&[], DEFAULT_BRANCH_NAME).unwrap();
        alice
            .stage(&[ws.into(), request.clone().into()])
            .unwrap();
        assert!(matches!(
            alice.commit("Add pets").unwrap(),
            CommitOutcome::Committed(_)
        ));
        alice.push().await.unwrap();

        let repo = repo();
        let mut bob = replica(remote.clone(), "bob");
        let summary = pull_backend_project(&mut bob, &backend_project(), &[], &repo)
            .await
            .unwrap();

        let pulled = summary.pulled.unwrap();
        assert_eq!(pulled.commits_received, 1);
        assert_eq!(repo.all_requests().await.unwrap(), vec![request]);

        // The pulled workspace is reattached to the new local project.
        let workspace = repo.get_workspace("wrk_1").await.unwrap().unwrap();
        assert_eq!(workspace.parent_id.as_deref(), Some(summary.project.id.as_str()));
        assert_eq!(summary.workspace_change, WorkspaceChange::Corrected);

        remote.revoke("team_1").unwrap();
        let err = pull_backend_project(&mut bob, &backend_project(), &[summary.project], &repo)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied { .. }));
    }
}

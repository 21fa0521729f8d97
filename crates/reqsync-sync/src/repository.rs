//! Local document records.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use reqsync_store::Driver;
use reqsync_types::{now_millis, Document, Project, Request, RequestGroup, Workspace};

use crate::error::{RepoError, RepoResult};

/// Read/write contract for the local records reconciliation touches.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create_project(&self, project: Project) -> RepoResult<Project>;

    async fn project_by_remote_id(&self, remote_id: &str) -> RepoResult<Option<Project>>;

    async fn all_projects(&self) -> RepoResult<Vec<Project>>;

    async fn create_workspace(&self, workspace: Workspace) -> RepoResult<Workspace>;

    /// Replace an existing workspace record, bumping `modified`.
    async fn update_workspace(&self, workspace: Workspace) -> RepoResult<Workspace>;

    async fn get_workspace(&self, id: &str) -> RepoResult<Option<Workspace>>;

    async fn all_workspaces(&self) -> RepoResult<Vec<Workspace>>;

    async fn create_request(&self, request: Request) -> RepoResult<Request>;

    async fn all_requests(&self) -> RepoResult<Vec<Request>>;

    /// Every workspace, folder, and request whose root is `workspace_id`.
    async fn documents_in(&self, workspace_id: &str) -> RepoResult<Vec<Document>>;

    /// Insert or replace any versioned document.
    async fn upsert_document(&self, document: Document) -> RepoResult<()>;

    /// Remove a document by id. Returns `true` if it existed.
    async fn remove_document(&self, id: &str) -> RepoResult<bool>;
}

const PROJECTS: &str = "projects";
const WORKSPACES: &str = "workspaces";
const GROUPS: &str = "request_groups";
const REQUESTS: &str = "requests";

/// [`DocumentRepository`] storing one JSON record per key on a driver.
///
/// Keys are `db/<collection>/<id>.json`. Pair with a `MemoryDriver` for an
/// in-memory repository or an `FsDriver` for a persistent one.
#[derive(Clone)]
pub struct DriverRepository {
    driver: Arc<dyn Driver>,
}

impl DriverRepository {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    fn key(collection: &str, id: &str) -> String {
        format!("db/{collection}/{id}.json")
    }

    fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> RepoResult<Option<T>> {
        match self.driver.read(&Self::key(collection, id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> RepoResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.driver.write(&Self::key(collection, id), &bytes)?;
        Ok(())
    }

    fn insert<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> RepoResult<()> {
        if self.driver.exists(&Self::key(collection, id))? {
            return Err(RepoError::AlreadyExists(id.to_string()));
        }
        self.put(collection, id, value)?;
        debug!(collection, id, "inserted record");
        Ok(())
    }

    fn all<T: DeserializeOwned>(&self, collection: &str) -> RepoResult<Vec<T>> {
        let mut out = Vec::new();
        for key in self.driver.list(&format!("db/{collection}/"))? {
            if let Some(bytes) = self.driver.read(&key)? {
                out.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl DocumentRepository for DriverRepository {
    async fn create_project(&self, project: Project) -> RepoResult<Project> {
        self.insert(PROJECTS, &project.id, &project)?;
        Ok(project)
    }

    async fn project_by_remote_id(&self, remote_id: &str) -> RepoResult<Option<Project>> {
        let projects: Vec<Project> = self.all(PROJECTS)?;
        Ok(projects
            .into_iter()
            .find(|p| p.remote_id.as_deref() == Some(remote_id)))
    }

    async fn all_projects(&self) -> RepoResult<Vec<Project>> {
        self.all(PROJECTS)
    }

    async fn create_workspace(&self, workspace: Workspace) -> RepoResult<Workspace> {
        self.insert(WORKSPACES, &workspace.id, &workspace)?;
        Ok(workspace)
    }

    async fn update_workspace(&self, mut workspace: Workspace) -> RepoResult<Workspace> {
        if self.get::<Workspace>(WORKSPACES, &workspace.id)?.is_none() {
            return Err(RepoError::NotFound(workspace.id));
        }
        workspace.modified = now_millis();
        self.put(WORKSPACES, &workspace.id, &workspace)?;
        Ok(workspace)
    }

    async fn get_workspace(&self, id: &str) -> RepoResult<Option<Workspace>> {
        self.get(WORKSPACES, id)
    }

    async fn all_workspaces(&self) -> RepoResult<Vec<Workspace>> {
        self.all(WORKSPACES)
    }

    async fn create_request(&self, request: Request) -> RepoResult<Request> {
        self.insert(REQUESTS, &request.id, &request)?;
        Ok(request)
    }

    async fn all_requests(&self) -> RepoResult<Vec<Request>> {
        self.all(REQUESTS)
    }

    async fn documents_in(&self, workspace_id: &str) -> RepoResult<Vec<Document>> {
        let Some(root) = self.get::<Workspace>(WORKSPACES, workspace_id)? else {
            return Ok(Vec::new());
        };
        let groups: Vec<RequestGroup> = self.all(GROUPS)?;
        let requests: Vec<Request> = self.all(REQUESTS)?;

        // Folders nest, so widen the set of known parents until it is stable.
        let mut parents = std::collections::BTreeSet::from([root.id.clone()]);
        loop {
            let before = parents.len();
            for group in &groups {
                if parents.contains(&group.parent_id) {
                    parents.insert(group.id.clone());
                }
            }
            if parents.len() == before {
                break;
            }
        }

        let mut docs = vec![Document::Workspace(root)];
        docs.extend(
            groups
                .into_iter()
                .filter(|g| parents.contains(&g.parent_id))
                .map(Document::RequestGroup),
        );
        docs.extend(
            requests
                .into_iter()
                .filter(|r| parents.contains(&r.parent_id))
                .map(Document::Request),
        );
        Ok(docs)
    }

    async fn upsert_document(&self, document: Document) -> RepoResult<()> {
        match &document {
            Document::Workspace(w) => self.put(WORKSPACES, &w.id, w)?,
            Document::RequestGroup(g) => self.put(GROUPS, &g.id, g)?,
            Document::Request(r) => self.put(REQUESTS, &r.id, r)?,
        }
        debug!(id = document.id(), kind = %document.doc_type(), "upserted document");
        Ok(())
    }

    async fn remove_document(&self, id: &str) -> RepoResult<bool> {
        for collection in [WORKSPACES, GROUPS, REQUESTS] {
            if self.driver.delete(&Self::key(collection, id))? {
                debug!(collection, id, "removed document");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

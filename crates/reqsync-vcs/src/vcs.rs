use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use reqsync_store::{ContentHasher, Driver, ObjectStore};
use reqsync_types::{now_millis, BackendProject, ContentHash, Document, DocumentId};

use crate::branch::Branch;
use crate::commit::{self, Commit, Snapshot, SnapshotEntry};
use crate::config::VcsConfig;
use crate::error::{VcsError, VcsResult};
use crate::meta::ProjectMeta;
use crate::names::validate_branch_name;
use crate::remote::{self, Remote, RemoteScope};
use crate::stage::{working_status, Change, Stage, StageEntry, StatusEntry, WorkingStatus};

/// Documents to write and remove to move a working set between states.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutDelta {
    pub upsert: Vec<Document>,
    pub remove: Vec<DocumentId>,
}

impl CheckoutDelta {
    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty()
    }
}

/// How a branch moved during pull or push.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStatus {
    #[default]
    UpToDate,
    FastForward,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullOutcome {
    pub status: MergeStatus,
    pub commits_received: usize,
    pub upsert: Vec<Document>,
    pub remove: Vec<DocumentId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PushOutcome {
    pub status: MergeStatus,
    pub commits_sent: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(Commit),
    NothingToCommit,
}

struct Bound {
    project: BackendProject,
    meta: ProjectMeta,
}

/// Version control for one backend project at a time.
///
/// Holds the bound project, the current branch, and the staging area.
/// Mutating operations take `&mut self`, so one instance has a single
/// writer; the object store may be shared between instances.
pub struct Vcs {
    store: ObjectStore,
    meta_driver: Arc<dyn Driver>,
    remote: Arc<dyn Remote>,
    config: VcsConfig,
    bound: Option<Bound>,
    branch: String,
    stage: Stage,
}

impl Vcs {
    pub fn new(
        store: ObjectStore,
        meta_driver: Arc<dyn Driver>,
        remote: Arc<dyn Remote>,
        config: VcsConfig,
    ) -> Self {
        let branch = config.default_branch.clone();
        Self {
            store,
            meta_driver,
            remote,
            config,
            bound: None,
            branch,
            stage: Stage::new(),
        }
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn config(&self) -> &VcsConfig {
        &self.config
    }

    pub fn backend_project(&self) -> Option<&BackendProject> {
        self.bound.as_ref().map(|b| &b.project)
    }

    pub fn current_branch(&self) -> &str {
        &self.branch
    }

    pub fn stage_len(&self) -> usize {
        self.stage.len()
    }

    fn bound(&self) -> VcsResult<&Bound> {
        self.bound.as_ref().ok_or(VcsError::NoBackendProject)
    }

    fn scope(&self) -> VcsResult<RemoteScope> {
        let project = &self.bound()?.project;
        Ok(RemoteScope {
            team_id: project.team.id.clone(),
            project_id: project.id.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Project binding
    // -----------------------------------------------------------------------

    /// Bind this instance to `project`.
    ///
    /// Persists the project record, clears the stage, and restores the
    /// project's last current branch (the default branch otherwise).
    pub fn set_backend_project(&mut self, project: &BackendProject) -> VcsResult<()> {
        let meta = ProjectMeta::new(self.meta_driver.clone(), &project.id);
        meta.save_project(project)?;
        self.branch = meta
            .current_branch()?
            .unwrap_or_else(|| self.config.default_branch.clone());
        self.stage.clear();
        self.bound = Some(Bound {
            project: project.clone(),
            meta,
        });
        info!(project = %project.id, name = %project.name, branch = %self.branch, "backend project set");
        Ok(())
    }

    /// Bind to a project previously recorded on this replica.
    pub fn load_backend_project(&mut self, project_id: &str) -> VcsResult<BackendProject> {
        let meta = ProjectMeta::new(self.meta_driver.clone(), project_id);
        let project = meta
            .load_project()?
            .ok_or_else(|| VcsError::ProjectNotFound(project_id.to_string()))?;
        self.set_backend_project(&project)?;
        Ok(project)
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    fn load_branch(&self, name: &str) -> VcsResult<Option<Branch>> {
        self.bound()?.meta.branch(name)
    }

    fn head_of(&self, name: &str) -> VcsResult<Option<ContentHash>> {
        Ok(self.load_branch(name)?.and_then(|b| b.head))
    }

    fn snapshot_at(&self, head: Option<ContentHash>) -> VcsResult<Snapshot> {
        match head {
            Some(id) => Ok(Commit::load(&self.store, &id)?.snapshot()),
            None => Ok(Snapshot::new()),
        }
    }

    fn head_snapshot(&self) -> VcsResult<Snapshot> {
        let head = self.head_of(&self.branch)?;
        self.snapshot_at(head)
    }

    /// Local branch names, sorted.
    pub fn branches(&self) -> VcsResult<Vec<String>> {
        self.bound()?.meta.branch_names()
    }

    /// Delete a local branch other than the current one.
    pub fn remove_branch(&mut self, name: &str) -> VcsResult<()> {
        let bound = self.bound()?;
        if name == self.branch {
            return Err(VcsError::DeleteCurrentBranch(name.to_string()));
        }
        if !bound.meta.delete_branch(name)? {
            return Err(VcsError::BranchNotFound(name.to_string()));
        }
        info!(branch = name, "removed branch");
        Ok(())
    }

    /// Branch names that exist remotely for the bound project.
    pub async fn get_remote_branches(&self) -> VcsResult<Vec<String>> {
        let scope = self.scope()?;
        let mut names = self.remote.branches(&scope).await?;
        names.sort();
        debug!(project = %scope.project_id, count = names.len(), "listed remote branches");
        Ok(names)
    }

    /// Make `branch_name` current, creating it from the current head when
    /// missing.
    ///
    /// `documents` is the working set. Documents with edits not yet
    /// committed block the checkout if the target state would overwrite or
    /// remove them; untracked documents are never removed.
    pub fn checkout(&mut self, documents: &[Document], branch_name: &str) -> VcsResult<CheckoutDelta> {
        validate_branch_name(branch_name)?;
        let current_head = self.head_of(&self.branch)?;
        let from = self.snapshot_at(current_head)?;

        let target = match self.load_branch(branch_name)? {
            Some(branch) => branch,
            None => {
                let branch = Branch::new(branch_name, current_head);
                self.bound()?.meta.save_branch(&branch)?;
                info!(
                    branch = branch_name,
                    from = %self.branch,
                    head = ?current_head.map(|h| h.short()),
                    "created branch"
                );
                branch
            }
        };
        let to = self.snapshot_at(target.head)?;

        let blocked = self.blocked_documents(&from, &to, documents)?;
        if !blocked.is_empty() {
            warn!(branch = branch_name, documents = blocked.len(), "checkout blocked by uncommitted changes");
            return Err(VcsError::UncommittedChanges { documents: blocked });
        }

        let delta = self.transition(&from, &to, documents)?;
        self.branch = branch_name.to_string();
        self.bound()?.meta.set_current_branch(branch_name)?;
        debug!(
            branch = branch_name,
            upsert = delta.upsert.len(),
            remove = delta.remove.len(),
            "checked out"
        );
        Ok(delta)
    }

    /// Ids of documents whose uncommitted edits moving from `from` to `to`
    /// would overwrite or remove.
    ///
    /// A working document is dirty when it differs from `from`; a staged
    /// entry blocks whenever its document changes between the two states.
    fn blocked_documents(&self, from: &Snapshot, to: &Snapshot, documents: &[Document]) -> VcsResult<Vec<String>> {
        let mut blocked = BTreeSet::new();
        for doc in documents {
            let blob = ContentHasher::BLOB.hash(&doc.to_bytes()?);
            let tracked = from.get(doc.id());
            let dirty = tracked.map_or(true, |e| e.blob != blob);
            if !dirty {
                continue;
            }
            let before = tracked.map(|e| e.blob);
            let after = to.get(doc.id()).map(|e| e.blob);
            if before != after && after != Some(blob) {
                blocked.insert(doc.id().to_string());
            }
        }
        for entry in self.stage.entries() {
            let before = from.get(&entry.key).map(|e| e.blob);
            let after = to.get(&entry.key).map(|e| e.blob);
            if before != after {
                blocked.insert(entry.key.clone());
            }
        }
        Ok(blocked.into_iter().collect())
    }

    /// Documents to upsert and remove to go from `from` to `to`.
    ///
    /// Without a working set, documents that changed between the two states
    /// are upserted. With one, documents missing locally are upserted too,
    /// and local copies are kept when already identical to `to` or when the
    /// document did not change between the states.
    fn transition(&self, from: &Snapshot, to: &Snapshot, working: &[Document]) -> VcsResult<CheckoutDelta> {
        let mut local: BTreeMap<&str, ContentHash> = BTreeMap::new();
        for doc in working {
            local.insert(doc.id(), ContentHasher::BLOB.hash(&doc.to_bytes()?));
        }

        let mut delta = CheckoutDelta::default();
        for (key, entry) in to {
            let unchanged = from.get(key).map(|e| e.blob) == Some(entry.blob);
            let keep = if working.is_empty() {
                unchanged
            } else {
                local
                    .get(key.as_str())
                    .is_some_and(|blob| *blob == entry.blob || unchanged)
            };
            if keep {
                continue;
            }
            let data = self.store.get_blob(&entry.blob)?;
            delta.upsert.push(Document::from_bytes(&data)?);
        }
        delta.remove = from
            .keys()
            .filter(|key| !to.contains_key(*key))
            .cloned()
            .collect();
        Ok(delta)
    }

    // -----------------------------------------------------------------------
    // Working set
    // -----------------------------------------------------------------------

    /// Every document at the current branch head.
    pub fn all_documents(&self) -> VcsResult<Vec<Document>> {
        self.head_snapshot()?
            .values()
            .map(|entry| -> VcsResult<Document> {
                let data = self.store.get_blob(&entry.blob)?;
                Ok(Document::from_bytes(&data)?)
            })
            .collect()
    }

    /// Stage documents that differ from head. Returns what was staged.
    pub fn stage(&mut self, documents: &[Document]) -> VcsResult<Vec<StatusEntry>> {
        let head = self.head_snapshot()?;
        let mut staged = Vec::new();
        for doc in documents {
            let content = doc.to_bytes()?;
            let blob = ContentHasher::BLOB.hash(&content);
            let previous = head.get(doc.id()).map(|e| e.blob);
            if previous == Some(blob) {
                self.stage.remove(doc.id());
                continue;
            }
            let change = if previous.is_some() {
                Change::Modified
            } else {
                Change::Added
            };
            self.stage.insert(StageEntry {
                key: doc.id().to_string(),
                name: doc.name().to_string(),
                doc_type: doc.doc_type(),
                change,
                content: Some(content),
                previous,
            });
            staged.push(StatusEntry::new(doc.id(), doc.name(), change));
        }
        debug!(count = staged.len(), "staged documents");
        Ok(staged)
    }

    /// Stage the removal of a tracked document.
    pub fn stage_deletion(&mut self, id: &str) -> VcsResult<StatusEntry> {
        let head = self.head_snapshot()?;
        let entry = head
            .get(id)
            .ok_or_else(|| VcsError::NotTracked(id.to_string()))?;
        self.stage.insert(StageEntry {
            key: entry.key.clone(),
            name: entry.name.clone(),
            doc_type: entry.doc_type,
            change: Change::Deleted,
            content: None,
            previous: Some(entry.blob),
        });
        Ok(StatusEntry::new(&entry.key, &entry.name, Change::Deleted))
    }

    /// Drop staged entries. Returns how many were removed.
    pub fn unstage(&mut self, ids: &[&str]) -> usize {
        ids.iter()
            .filter(|id| self.stage.remove(id).is_some())
            .count()
    }

    /// Compare the working set against head and the stage.
    pub fn status(&self, documents: &[Document]) -> VcsResult<WorkingStatus> {
        let head = self.head_snapshot()?;
        working_status(&head, &self.stage, documents)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Record staged changes as a new commit on the current branch.
    pub fn commit(&mut self, message: &str) -> VcsResult<CommitOutcome> {
        let bound = self.bound()?;
        if self.stage.is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }
        let mut branch = bound
            .meta
            .branch(&self.branch)?
            .unwrap_or_else(|| Branch::new(self.branch.clone(), None));
        let mut snapshot = self.snapshot_at(branch.head)?;

        for entry in self.stage.entries() {
            match (&entry.content, entry.change) {
                (_, Change::Deleted) | (None, _) => {
                    snapshot.remove(&entry.key);
                }
                (Some(content), _) => {
                    let base = snapshot.get(&entry.key).map(|e| e.blob);
                    let blob = match base {
                        Some(base) => self.store.put_blob_delta(content, &base)?,
                        None => self.store.put_blob(content)?,
                    };
                    snapshot.insert(
                        entry.key.clone(),
                        SnapshotEntry {
                            key: entry.key.clone(),
                            name: entry.name.clone(),
                            doc_type: entry.doc_type,
                            blob,
                        },
                    );
                }
            }
        }

        let commit = Commit::create(
            &self.store,
            branch.head,
            &self.config.author,
            message,
            now_millis(),
            snapshot,
        )?;
        branch.advance(commit.id);
        bound.meta.save_branch(&branch)?;
        let changes = self.stage.drain().len();
        info!(
            branch = %branch.name,
            commit = %commit.id.short(),
            changes,
            "created commit"
        );
        Ok(CommitOutcome::Committed(commit))
    }

    /// Commits on the current branch, newest first.
    pub fn history(&self) -> VcsResult<Vec<Commit>> {
        let head = self.head_of(&self.branch)?;
        commit::walk(&self.store, head)
    }

    // -----------------------------------------------------------------------
    // Remote sync
    // -----------------------------------------------------------------------

    /// Fast-forward the current branch to the remote branch.
    ///
    /// `remote_project_id` is the team the pull runs on behalf of.
    /// `existing` is the local working set: documents already identical are
    /// not returned for upsert and local documents the remote never tracked
    /// are left alone. Local or staged edits the incoming history would
    /// overwrite fail the pull with `UncommittedChanges` before the branch
    /// moves.
    pub async fn pull(&mut self, existing: &[Document], remote_project_id: &str) -> VcsResult<PullOutcome> {
        let project_id = self.bound()?.project.id.clone();
        let scope = RemoteScope {
            team_id: remote_project_id.to_string(),
            project_id,
        };
        let branch_name = self.branch.clone();
        let mut branch = self
            .load_branch(&branch_name)?
            .unwrap_or_else(|| Branch::new(branch_name.clone(), None));
        let local_head = branch.head;

        let history = self.remote.fetch(&scope, &branch_name, local_head).await?;
        if history.head.is_none() || history.head == local_head || history.is_empty() {
            return Ok(PullOutcome::default());
        }
        if let Some(remote_head) = history.head {
            if commit::is_ancestor(&self.store, &remote_head, local_head)? {
                debug!(branch = %branch_name, "local branch is ahead of remote");
                return Ok(PullOutcome::default());
            }
        }

        let first_parent = Commit::from_unaddressed_record(&history.commits[0])?.parent;
        if first_parent != local_head {
            warn!(branch = %branch_name, "remote history diverged");
            return Err(VcsError::NotFastForward(branch_name));
        }

        let verified = remote::verify_history(&self.store, &history, local_head)?;
        remote::import_history(&self.store, &verified, local_head)?;

        let from = self.snapshot_at(local_head)?;
        let new_head = verified
            .commits
            .last()
            .map(|c| c.id)
            .ok_or_else(|| VcsError::InvalidHistory("empty history".into()))?;
        let to = self.snapshot_at(Some(new_head))?;

        let blocked = self.blocked_documents(&from, &to, existing)?;
        if !blocked.is_empty() {
            warn!(branch = %branch_name, documents = blocked.len(), "pull blocked by uncommitted changes");
            return Err(VcsError::UncommittedChanges { documents: blocked });
        }

        branch.advance(new_head);
        self.bound()?.meta.save_branch(&branch)?;
        self.bound()?.meta.set_current_branch(&branch_name)?;

        let mut delta = self.transition(&from, &to, existing)?;
        let local_ids: BTreeSet<&str> = existing.iter().map(Document::id).collect();
        delta
            .remove
            .retain(|id| local_ids.is_empty() || local_ids.contains(id.as_str()));

        info!(
            branch = %branch_name,
            head = %new_head.short(),
            commits = verified.commits.len(),
            upsert = delta.upsert.len(),
            remove = delta.remove.len(),
            "fast-forwarded from remote"
        );
        Ok(PullOutcome {
            status: MergeStatus::FastForward,
            commits_received: verified.commits.len(),
            upsert: delta.upsert,
            remove: delta.remove,
        })
    }

    /// Fast-forward the remote branch to the current local branch.
    pub async fn push(&mut self) -> VcsResult<PushOutcome> {
        let scope = self.scope()?;
        let branch_name = self.branch.clone();
        let local_head = self.head_of(&branch_name)?;
        let Some(local_head) = local_head else {
            return Ok(PushOutcome::default());
        };

        let remote_view = self.remote.fetch(&scope, &branch_name, Some(local_head)).await?;
        let remote_head = remote_view.head;
        if remote_head == Some(local_head) {
            return Ok(PushOutcome::default());
        }
        if let Some(remote_head) = remote_head {
            if !commit::is_ancestor(&self.store, &remote_head, Some(local_head))? {
                warn!(branch = %branch_name, "remote has commits missing locally");
                return Err(VcsError::NotFastForward(branch_name));
            }
        }

        let history = remote::collect_history(&self.store, Some(local_head), remote_head)?;
        let commits_sent = history.commits.len();
        self.remote.push(&scope, &branch_name, history).await?;
        info!(branch = %branch_name, commits = commits_sent, "pushed to remote");
        Ok(PushOutcome {
            status: MergeStatus::FastForward,
            commits_sent,
        })
    }
}

impl std::fmt::Debug for Vcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vcs")
            .field("project", &self.backend_project().map(|p| &p.id))
            .field("branch", &self.branch)
            .field("staged", &self.stage.len())
            .finish_non_exhaustive()
    }
}

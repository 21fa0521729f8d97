//! Remote contract and a driver-backed emulation of the remote service.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use reqsync_store::{ContentHasher, Driver, ObjectStore};
use reqsync_types::ContentHash;

use crate::commit::{self, Commit};
use crate::error::{VcsError, VcsResult};
use crate::names::validate_branch_name;

/// Which remote project an operation targets, and on behalf of which team.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteScope {
    pub team_id: String,
    pub project_id: String,
}

/// A run of commits plus the blobs they reference.
///
/// `commits` holds serialized commit records ordered oldest first; each
/// record's address is recomputed by the receiver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHistory {
    /// Branch head on the sending side.
    pub head: Option<ContentHash>,
    pub commits: Vec<Vec<u8>>,
    pub blobs: Vec<Vec<u8>>,
}

impl RemoteHistory {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Remote backend holding shared project history.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Branch names that exist remotely for the project.
    async fn branches(&self, scope: &RemoteScope) -> VcsResult<Vec<String>>;

    /// History of `branch` after `have`.
    ///
    /// When `have` is not part of the remote branch the full history is
    /// returned, so the caller can tell divergence from a fast-forward.
    async fn fetch(
        &self,
        scope: &RemoteScope,
        branch: &str,
        have: Option<ContentHash>,
    ) -> VcsResult<RemoteHistory>;

    /// Fast-forward the remote `branch` with `history`.
    async fn push(&self, scope: &RemoteScope, branch: &str, history: RemoteHistory)
        -> VcsResult<()>;
}

/// Received history after verification.
#[derive(Debug)]
pub struct VerifiedHistory {
    /// Commits ordered oldest first.
    pub commits: Vec<Commit>,
    /// Transferred blobs by address.
    pub blobs: BTreeMap<ContentHash, Vec<u8>>,
}

/// Check addresses, parent continuity from `base`, and the declared head.
///
/// Blobs referenced by the commits must be in the transfer or in `store`.
pub fn verify_history(
    store: &ObjectStore,
    history: &RemoteHistory,
    base: Option<ContentHash>,
) -> VcsResult<VerifiedHistory> {
    let mut commits = Vec::with_capacity(history.commits.len());
    let mut expected_parent = base;
    for record in &history.commits {
        let commit = Commit::from_unaddressed_record(record)?;
        // The record must already be in canonical form, or it would be
        // stored under a different address than the one it was sent as.
        Commit::from_record(commit.id, &commit.record_bytes()?)?;
        if commit.parent != expected_parent {
            return Err(VcsError::InvalidHistory(format!(
                "commit {} does not follow {}",
                commit.id.short(),
                expected_parent.map_or_else(|| "the root".to_string(), |p| p.short())
            )));
        }
        expected_parent = Some(commit.id);
        commits.push(commit);
    }
    if let Some(last) = commits.last() {
        if history.head != Some(last.id) {
            return Err(VcsError::InvalidHistory(
                "declared head does not match the last commit".into(),
            ));
        }
    }

    let blobs: BTreeMap<ContentHash, Vec<u8>> = history
        .blobs
        .iter()
        .map(|data| (ContentHasher::BLOB.hash(data), data.clone()))
        .collect();
    for commit in &commits {
        for entry in &commit.state {
            if !blobs.contains_key(&entry.blob) && !store.has_blob(&entry.blob)? {
                return Err(VcsError::InvalidHistory(format!(
                    "commit {} references missing blob {} for {}",
                    commit.id.short(),
                    entry.blob.short(),
                    entry.key
                )));
            }
        }
    }

    Ok(VerifiedHistory { commits, blobs })
}

/// Write verified history into `store`.
///
/// Blobs are stored as deltas against the previous version of the same
/// document when one is available.
pub fn import_history(
    store: &ObjectStore,
    verified: &VerifiedHistory,
    base: Option<ContentHash>,
) -> VcsResult<()> {
    let mut previous = match base {
        Some(id) => Commit::load(store, &id)?.snapshot(),
        None => Default::default(),
    };
    for commit in &verified.commits {
        for entry in &commit.state {
            let Some(data) = verified.blobs.get(&entry.blob) else {
                continue;
            };
            match previous.get(&entry.key) {
                Some(prev) if prev.blob != entry.blob => {
                    store.put_blob_delta(data, &prev.blob)?;
                }
                _ => {
                    store.put_blob(data)?;
                }
            }
        }
        store.put_commit(&commit.record_bytes()?)?;
        previous = commit.snapshot();
    }
    Ok(())
}

/// Package the commits after `since` up to `head`, oldest first, with every
/// blob they reference.
pub fn collect_history(
    store: &ObjectStore,
    head: Option<ContentHash>,
    since: Option<ContentHash>,
) -> VcsResult<RemoteHistory> {
    let mut chain = Vec::new();
    for commit in commit::walk(store, head)? {
        if Some(commit.id) == since {
            break;
        }
        chain.push(commit);
    }
    chain.reverse();

    let mut seen = HashSet::new();
    let mut blobs = Vec::new();
    let mut commits = Vec::with_capacity(chain.len());
    for commit in &chain {
        for entry in &commit.state {
            if seen.insert(entry.blob) {
                blobs.push(store.get_blob(&entry.blob)?);
            }
        }
        commits.push(commit.record_bytes()?);
    }
    Ok(RemoteHistory {
        head,
        commits,
        blobs,
    })
}

// ---------------------------------------------------------------------------
// StoreRemote
// ---------------------------------------------------------------------------

/// Remote service emulated over a driver.
///
/// Objects live in a shared [`ObjectStore`]; branch heads live under
/// `remote/<project>/branches/<name>`; access is granted per team under
/// `access/<team>`. Suitable for tests and for sharing a directory between
/// replicas.
pub struct StoreRemote {
    driver: Arc<dyn Driver>,
    store: ObjectStore,
}

#[derive(Serialize, Deserialize)]
struct RemoteBranch {
    head: ContentHash,
}

impl StoreRemote {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        let store = ObjectStore::new(driver.clone());
        Self { driver, store }
    }

    /// Allow `team_id` to read and write its projects.
    pub fn grant(&self, team_id: &str) -> VcsResult<()> {
        self.driver.write(&format!("access/{team_id}"), b"")?;
        info!(team = team_id, "granted remote access");
        Ok(())
    }

    pub fn revoke(&self, team_id: &str) -> VcsResult<()> {
        self.driver.delete(&format!("access/{team_id}"))?;
        info!(team = team_id, "revoked remote access");
        Ok(())
    }

    fn authorize(&self, scope: &RemoteScope) -> VcsResult<()> {
        let allowed = self
            .driver
            .exists(&format!("access/{}", scope.team_id))
            .map_err(transport)?;
        if !allowed {
            warn!(team = %scope.team_id, project = %scope.project_id, "remote access denied");
            return Err(VcsError::Unauthorized(format!(
                "team {} has no access to project {}",
                scope.team_id, scope.project_id
            )));
        }
        Ok(())
    }

    fn branch_prefix(scope: &RemoteScope) -> String {
        format!("remote/{}/branches/", scope.project_id)
    }

    fn head(&self, scope: &RemoteScope, branch: &str) -> VcsResult<Option<ContentHash>> {
        let key = format!("{}{branch}", Self::branch_prefix(scope));
        match self.driver.read(&key).map_err(transport)? {
            Some(bytes) => {
                let record: RemoteBranch = serde_json::from_slice(&bytes)?;
                Ok(Some(record.head))
            }
            None => Ok(None),
        }
    }

    fn set_head(&self, scope: &RemoteScope, branch: &str, head: ContentHash) -> VcsResult<()> {
        let key = format!("{}{branch}", Self::branch_prefix(scope));
        let bytes = serde_json::to_vec(&RemoteBranch { head })?;
        self.driver.write(&key, &bytes).map_err(transport)
    }
}

fn transport(e: reqsync_store::StoreError) -> VcsError {
    VcsError::Transport(e.to_string())
}

#[async_trait]
impl Remote for StoreRemote {
    async fn branches(&self, scope: &RemoteScope) -> VcsResult<Vec<String>> {
        self.authorize(scope)?;
        let prefix = Self::branch_prefix(scope);
        let names = self
            .driver
            .list(&prefix)
            .map_err(transport)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        Ok(names)
    }

    async fn fetch(
        &self,
        scope: &RemoteScope,
        branch: &str,
        have: Option<ContentHash>,
    ) -> VcsResult<RemoteHistory> {
        self.authorize(scope)?;
        let head = self.head(scope, branch)?;
        let since = match have {
            Some(id) if commit::is_ancestor(&self.store, &id, head)? => Some(id),
            _ => None,
        };
        let history = collect_history(&self.store, head, since)?;
        debug!(
            project = %scope.project_id,
            branch,
            commits = history.commits.len(),
            blobs = history.blobs.len(),
            "served fetch"
        );
        Ok(history)
    }

    async fn push(
        &self,
        scope: &RemoteScope,
        branch: &str,
        history: RemoteHistory,
    ) -> VcsResult<()> {
        self.authorize(scope)?;
        validate_branch_name(branch)?;
        if history.is_empty() {
            return Ok(());
        }
        let current = self.head(scope, branch)?;
        let first_parent = Commit::from_unaddressed_record(&history.commits[0])?.parent;
        if first_parent != current {
            return Err(VcsError::NotFastForward(branch.to_string()));
        }
        let verified = verify_history(&self.store, &history, current)?;
        import_history(&self.store, &verified, current)?;
        if let Some(head) = history.head {
            self.set_head(scope, branch, head)?;
        }
        info!(
            project = %scope.project_id,
            branch,
            commits = verified.commits.len(),
            "accepted push"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{Snapshot, SnapshotEntry};
    use reqsync_store::MemoryDriver;
    use reqsync_types::{Document, Workspace};

    fn scope() -> RemoteScope {
        RemoteScope {
            team_id: "team_1".into(),
            project_id: "prj_1".into(),
        }
    }

    fn local_history(store: &ObjectStore, names: &[&str]) -> Vec<Commit> {
        let mut parent = None;
        let mut out = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let doc: Document = Workspace::with_id("wrk_1", *name).into();
            let blob = store.put_blob(&doc.to_bytes().unwrap()).unwrap();
            let mut snap = Snapshot::new();
            snap.insert("wrk_1".into(), SnapshotEntry::new(&doc, blob));
            let c = Commit::create(store, parent, "jane", name, i as i64, snap).unwrap();
            parent = Some(c.id);
            out.push(c);
        }
        out
    }

    #[tokio::test]
    async fn unauthorized_team_is_refused() {
        let remote = StoreRemote::new(Arc::new(MemoryDriver::new()));
        let err = remote.branches(&scope()).await.unwrap_err();
        assert!(matches!(err, VcsError::Unauthorized(_)));

        remote.grant("team_1").unwrap();
        assert!(remote.branches(&scope()).await.unwrap().is_empty());

        remote.revoke("team_1").unwrap();
        assert!(matches!(
            remote.fetch(&scope(), "master", None).await,
            Err(VcsError::Unauthorized(_))
        ));
    }

    #[test]
    fn non_canonical_commit_record_is_rejected() {
        let local = ObjectStore::new(Arc::new(MemoryDriver::new()));
        let commits = local_history(&local, &["one"]);
        let mut history = collect_history(&local, Some(commits[0].id), None).unwrap();
        assert!(verify_history(&local, &history, None).is_ok());

        let value: serde_json::Value = serde_json::from_slice(&history.commits[0]).unwrap();
        let pretty = serde_json::to_vec_pretty(&value).unwrap();
        history.head = Some(ContentHasher::COMMIT.hash(&pretty));
        history.commits[0] = pretty;
        assert!(matches!(
            verify_history(&local, &history, None),
            Err(VcsError::InvalidHistory(_))
        ));
    }

    #[tokio::test]
    async fn push_then_fetch() {
        let local = ObjectStore::new(Arc::new(MemoryDriver::new()));
        let commits = local_history(&local, &["one", "two"]);
        let head = commits.last().map(|c| c.id);

        let remote = StoreRemote::new(Arc::new(MemoryDriver::new()));
        remote.grant("team_1").unwrap();
        let history = collect_history(&local, head, None).unwrap();
        assert_eq!(history.commits.len(), 2);
        assert_eq!(history.blobs.len(), 2);
        remote.push(&scope(), "master", history).await.unwrap();

        assert_eq!(remote.branches(&scope()).await.unwrap(), vec!["master"]);
        let full = remote.fetch(&scope(), "master", None).await.unwrap();
        assert_eq!(full.head, head);
        assert_eq!(full.commits.len(), 2);

        let partial = remote
            .fetch(&scope(), "master", Some(commits[0].id))
            .await
            .unwrap();
        assert_eq!(partial.commits.len(), 1);

        let none = remote.fetch(&scope(), "master", head).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn diverging_push_is_rejected() {
        let remote = StoreRemote::new(Arc::new(MemoryDriver::new()));
        remote.grant("team_1").unwrap();

        let a = ObjectStore::new(Arc::new(MemoryDriver::new()));
        let a_commits = local_history(&a, &["a1"]);
        remote
            .push(&scope(), "master", collect_history(&a, Some(a_commits[0].id), None).unwrap())
            .await
            .unwrap();

        let b = ObjectStore::new(Arc::new(MemoryDriver::new()));
        let b_commits = local_history(&b, &["b1"]);
        let err = remote
            .push(&scope(), "master", collect_history(&b, Some(b_commits[0].id), None).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::NotFastForward(_)));
    }

    #[test]
    fn verify_rejects_broken_chain() {
        let store = ObjectStore::new(Arc::new(MemoryDriver::new()));
        let commits = local_history(&store, &["one", "two"]);
        let mut history = collect_history(&store, commits.last().map(|c| c.id), None).unwrap();
        history.commits.remove(0);
        let empty = ObjectStore::new(Arc::new(MemoryDriver::new()));
        assert!(matches!(
            verify_history(&empty, &history, None),
            Err(VcsError::InvalidHistory(_))
        ));
    }

    #[test]
    fn verify_rejects_missing_blob() {
        let store = ObjectStore::new(Arc::new(MemoryDriver::new()));
        let commits = local_history(&store, &["one"]);
        let mut history = collect_history(&store, Some(commits[0].id), None).unwrap();
        history.blobs.clear();
        let empty = ObjectStore::new(Arc::new(MemoryDriver::new()));
        assert!(matches!(
            verify_history(&empty, &history, None),
            Err(VcsError::InvalidHistory(msg)) if msg.contains("missing blob")
        ));
    }

    #[test]
    fn verify_rejects_tampered_blob_content() {
        let store = ObjectStore::new(Arc::new(MemoryDriver::new()));
        let commits = local_history(&store, &["one"]);
        let mut history = collect_history(&store, Some(commits[0].id), None).unwrap();
        history.blobs[0] = b"tampered".to_vec();
        let empty = ObjectStore::new(Arc::new(MemoryDriver::new()));
        assert!(verify_history(&empty, &history, None).is_err());
    }

    #[test]
    fn verify_rejects_wrong_head() {
        let store = ObjectStore::new(Arc::new(MemoryDriver::new()));
        let commits = local_history(&store, &["one"]);
        let mut history = collect_history(&store, Some(commits[0].id), None).unwrap();
        history.head = Some(ContentHash::of(b"elsewhere"));
        let empty = ObjectStore::new(Arc::new(MemoryDriver::new()));
        assert!(verify_history(&empty, &history, None).is_err());
    }
}

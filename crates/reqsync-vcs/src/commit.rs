use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use reqsync_store::{ContentHasher, ObjectStore};
use reqsync_types::{ContentHash, Document, DocumentId, DocumentType};

use crate::error::{VcsError, VcsResult};

/// One document as captured by a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub key: DocumentId,
    pub name: String,
    pub doc_type: DocumentType,
    pub blob: ContentHash,
}

impl SnapshotEntry {
    pub fn new(document: &Document, blob: ContentHash) -> Self {
        Self {
            key: document.id().to_string(),
            name: document.name().to_string(),
            doc_type: document.doc_type(),
            blob,
        }
    }
}

/// Document states keyed by id.
pub type Snapshot = BTreeMap<DocumentId, SnapshotEntry>;

/// Immutable history node.
///
/// The id is the commit-domain hash of the serialized record (every field
/// except `id`), so a commit cannot be altered without changing its address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub id: ContentHash,
    pub parent: Option<ContentHash>,
    pub author: String,
    pub message: String,
    pub created: i64,
    pub state: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct CommitRecord {
    parent: Option<ContentHash>,
    author: String,
    message: String,
    created: i64,
    state: Vec<SnapshotEntry>,
}

impl Commit {
    /// Serialize the record this commit is addressed by.
    pub fn record_bytes(&self) -> VcsResult<Vec<u8>> {
        let record = CommitRecord {
            parent: self.parent,
            author: self.author.clone(),
            message: self.message.clone(),
            created: self.created,
            state: self.state.clone(),
        };
        Ok(serde_json::to_vec(&record)?)
    }

    /// Parse a record and check that it hashes to `id`.
    pub fn from_record(id: ContentHash, bytes: &[u8]) -> VcsResult<Self> {
        if !ContentHasher::COMMIT.verify(bytes, &id) {
            return Err(VcsError::InvalidHistory(format!(
                "commit {} does not match its content",
                id.short()
            )));
        }
        Self::decode(id, bytes)
    }

    /// Parse a record received without an id, deriving the id from its bytes.
    pub fn from_unaddressed_record(bytes: &[u8]) -> VcsResult<Self> {
        Self::decode(ContentHasher::COMMIT.hash(bytes), bytes)
    }

    fn decode(id: ContentHash, bytes: &[u8]) -> VcsResult<Self> {
        let record: CommitRecord = serde_json::from_slice(bytes).map_err(|e| {
            VcsError::InvalidHistory(format!("malformed commit {}: {e}", id.short()))
        })?;
        Ok(Self {
            id,
            parent: record.parent,
            author: record.author,
            message: record.message,
            created: record.created,
            state: record.state,
        })
    }

    /// Write a new commit to `store` and return it with its id filled in.
    pub fn create(
        store: &ObjectStore,
        parent: Option<ContentHash>,
        author: &str,
        message: &str,
        created: i64,
        snapshot: Snapshot,
    ) -> VcsResult<Self> {
        let mut commit = Self {
            id: ContentHash::from_digest([0; 32]),
            parent,
            author: author.to_string(),
            message: message.to_string(),
            created,
            state: snapshot.into_values().collect(),
        };
        commit.id = store.put_commit(&commit.record_bytes()?)?;
        Ok(commit)
    }

    /// Load and verify a stored commit.
    pub fn load(store: &ObjectStore, id: &ContentHash) -> VcsResult<Self> {
        let bytes = store.get_commit(id)?;
        Self::decode(*id, &bytes)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state
            .iter()
            .map(|entry| (entry.key.clone(), entry.clone()))
            .collect()
    }
}

/// Walk first-parent history from `head`, newest first.
pub fn walk(store: &ObjectStore, head: Option<ContentHash>) -> VcsResult<Vec<Commit>> {
    let mut out = Vec::new();
    let mut next = head;
    while let Some(id) = next {
        let commit = Commit::load(store, &id)?;
        next = commit.parent;
        out.push(commit);
    }
    Ok(out)
}

/// Whether `ancestor` is reachable from `head` (inclusive).
pub fn is_ancestor(
    store: &ObjectStore,
    ancestor: &ContentHash,
    head: Option<ContentHash>,
) -> VcsResult<bool> {
    let mut next = head;
    while let Some(id) = next {
        if id == *ancestor {
            return Ok(true);
        }
        next = Commit::load(store, &id)?.parent;
    }
    Ok(false)
}

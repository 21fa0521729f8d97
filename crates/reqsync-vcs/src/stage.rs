//! Staging area and working-set status.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use reqsync_store::ContentHasher;
use reqsync_types::{ContentHash, Document, DocumentId, DocumentType};

use crate::commit::Snapshot;
use crate::error::VcsResult;

/// Kind of pending change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    Added,
    Modified,
    Deleted,
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// A pending change to one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageEntry {
    pub key: DocumentId,
    pub name: String,
    pub doc_type: DocumentType,
    pub change: Change,
    /// Serialized document; `None` for deletions.
    pub content: Option<Vec<u8>>,
    /// Blob the document had at head, for modifications and deletions.
    pub previous: Option<ContentHash>,
}

impl StageEntry {
    /// Address the staged content will have once stored.
    pub fn blob(&self) -> Option<ContentHash> {
        self.content.as_deref().map(|c| ContentHasher::BLOB.hash(c))
    }
}

/// Pending changes keyed by document id.
#[derive(Clone, Debug, Default)]
pub struct Stage {
    entries: BTreeMap<DocumentId, StageEntry>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StageEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &StageEntry> {
        self.entries.values()
    }

    pub fn insert(&mut self, entry: StageEntry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<StageEntry> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Take every entry, leaving the stage empty.
    pub fn drain(&mut self) -> Vec<StageEntry> {
        std::mem::take(&mut self.entries).into_values().collect()
    }
}

/// A document and how it differs from head.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub key: DocumentId,
    pub name: String,
    pub change: Change,
}

impl StatusEntry {
    pub fn new(key: impl Into<String>, name: impl Into<String>, change: Change) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            change,
        }
    }
}

/// Working-set status relative to the current head.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkingStatus {
    /// Changes recorded in the staging area.
    pub staged: Vec<StatusEntry>,
    /// Changes present in the working set but not staged.
    pub unstaged: Vec<StatusEntry>,
}

impl WorkingStatus {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty()
    }
}

/// Compare a working set against head and the stage.
pub fn working_status(head: &Snapshot, stage: &Stage, documents: &[Document]) -> VcsResult<WorkingStatus> {
    let mut status = WorkingStatus {
        staged: stage
            .entries()
            .map(|e| StatusEntry::new(&e.key, &e.name, e.change))
            .collect(),
        unstaged: Vec::new(),
    };

    let mut seen = std::collections::BTreeSet::new();
    for doc in documents {
        seen.insert(doc.id());
        let blob = ContentHasher::BLOB.hash(&doc.to_bytes()?);
        // Staged content is the baseline once a document is staged.
        let baseline = match stage.get(doc.id()) {
            Some(entry) => entry.blob(),
            None => head.get(doc.id()).map(|e| e.blob),
        };
        let change = match (baseline, head.contains_key(doc.id())) {
            (Some(b), _) if b == blob => continue,
            (_, true) | (Some(_), false) => Change::Modified,
            (None, false) => Change::Added,
        };
        status
            .unstaged
            .push(StatusEntry::new(doc.id(), doc.name(), change));
    }

    for (key, entry) in head {
        let staged_delete = matches!(stage.get(key), Some(e) if e.change == Change::Deleted);
        if !seen.contains(key.as_str()) && !staged_delete {
            status
                .unstaged
                .push(StatusEntry::new(key, &entry.name, Change::Deleted));
        }
    }
    Ok(status)
}

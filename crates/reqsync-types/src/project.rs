use serde::{Deserialize, Serialize};

use crate::ids::{generate_id, now_millis};

/// Local container for workspaces.
///
/// A project with a `remote_id` is linked to a remote team; local naming is
/// independent of the team's display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub remote_id: Option<String>,
    pub created: i64,
    pub modified: i64,
}

impl Project {
    /// A local-only project.
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id("proj"),
            name: name.into(),
            remote_id: None,
            created: now,
            modified: now,
        }
    }

    /// A project linked to the remote team `remote_id`.
    pub fn remote(name: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: Some(remote_id.into()),
            ..Self::new(name)
        }
    }

    pub fn is_remote(&self) -> bool {
        self.remote_id.is_some()
    }
}

/// Team that owns a backend project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

/// Remote, read-only description of a shared project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProject {
    pub id: String,
    pub name: String,
    pub root_document_id: String,
    pub team: Team,
}

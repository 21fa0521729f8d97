use serde::{Deserialize, Serialize};

use reqsync_types::DEFAULT_BRANCH_NAME;

/// Settings for a version-control instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcsConfig {
    /// Author recorded on new commits.
    pub author: String,
    /// Branch selected when a project has no persisted current branch.
    pub default_branch: String,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            author: "anonymous".into(),
            default_branch: DEFAULT_BRANCH_NAME.into(),
        }
    }
}

impl VcsConfig {
    pub fn with_author(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            ..Self::default()
        }
    }
}

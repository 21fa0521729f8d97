use serde::{Deserialize, Serialize};

use reqsync_types::{now_millis, ContentHash};

/// Named, mutable pointer into a project's commit history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    /// Latest commit; `None` while the branch has no history.
    pub head: Option<ContentHash>,
    pub created: i64,
    pub modified: i64,
}

impl Branch {
    pub fn new(name: impl Into<String>, head: Option<ContentHash>) -> Self {
        let now = now_millis();
        Self {
            name: name.into(),
            head,
            created: now,
            modified: now,
        }
    }

    /// Move the branch to `head`.
    pub fn advance(&mut self, head: ContentHash) {
        self.head = Some(head);
        self.modified = now_millis();
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

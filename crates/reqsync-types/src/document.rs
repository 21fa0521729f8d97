//! Versioned documents: the records a project's history is made of.
//!
//! Field names follow the JSON shape the desktop client persists
//! (`_id`, `parentId`, camelCase), so documents can be exchanged verbatim.

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{generate_id, now_millis};

/// Identifier of a document (`wrk_…`, `fld_…`, `req_…`).
pub type DocumentId = String;

/// Discriminant of a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentType {
    Workspace,
    RequestGroup,
    Request,
}

impl DocumentType {
    /// Prefix used when generating ids for this type.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Workspace => "wrk",
            Self::RequestGroup => "fld",
            Self::Request => "req",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Workspace => write!(f, "workspace"),
            Self::RequestGroup => write!(f, "request group"),
            Self::Request => write!(f, "request"),
        }
    }
}

/// What a workspace holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceScope {
    #[default]
    Collection,
    Design,
}

/// Root document of a request tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scope: WorkspaceScope,
    pub created: i64,
    pub modified: i64,
}

impl Workspace {
    /// A workspace with a generated id and no parent.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(generate_id(DocumentType::Workspace.id_prefix()), name)
    }

    /// A workspace with a caller-chosen id (e.g. a remote root document id).
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            parent_id: None,
            name: name.into(),
            description: String::new(),
            scope: WorkspaceScope::default(),
            created: now,
            modified: now,
        }
    }

    pub fn parented(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn scoped(mut self, scope: WorkspaceScope) -> Self {
        self.scope = scope;
        self
    }
}

/// A folder inside a workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestGroup {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub parent_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created: i64,
    pub modified: i64,
}

impl RequestGroup {
    pub fn new(parent_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(DocumentType::RequestGroup.id_prefix()),
            parent_id: parent_id.into(),
            name: name.into(),
            description: String::new(),
            created: now,
            modified: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub name: String,
    pub value: String,
}

/// A single API request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub parent_id: String,
    pub name: String,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<RequestHeader>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub description: String,
    pub created: i64,
    pub modified: i64,
}

impl Request {
    /// A `GET` request with an empty URL, named like the desktop client's default.
    pub fn new(parent_id: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(DocumentType::Request.id_prefix()),
            parent_id: parent_id.into(),
            name: "New Request".into(),
            method: "GET".into(),
            url: String::new(),
            headers: Vec::new(),
            body: String::new(),
            description: String::new(),
            created: now,
            modified: now,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_url(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.method = method.into();
        self.url = url.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Any document tracked by version control.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Document {
    Workspace(Workspace),
    RequestGroup(RequestGroup),
    Request(Request),
}

impl Document {
    pub fn id(&self) -> &str {
        match self {
            Self::Workspace(w) => &w.id,
            Self::RequestGroup(g) => &g.id,
            Self::Request(r) => &r.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Workspace(w) => &w.name,
            Self::RequestGroup(g) => &g.name,
            Self::Request(r) => &r.name,
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Self::Workspace(w) => w.parent_id.as_deref(),
            Self::RequestGroup(g) => Some(&g.parent_id),
            Self::Request(r) => Some(&r.parent_id),
        }
    }

    pub fn doc_type(&self) -> DocumentType {
        match self {
            Self::Workspace(_) => DocumentType::Workspace,
            Self::RequestGroup(_) => DocumentType::RequestGroup,
            Self::Request(_) => DocumentType::Request,
        }
    }

    /// Canonical serialized form stored as a blob.
    ///
    /// Struct fields serialize in declaration order, so equal documents
    /// always produce identical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::InvalidDocument(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(data).map_err(|e| TypeError::InvalidDocument(e.to_string()))
    }
}

impl From<Workspace> for Document {
    fn from(w: Workspace) -> Self {
        Self::Workspace(w)
    }
}

impl From<RequestGroup> for Document {
    fn from(g: RequestGroup) -> Self {
        Self::RequestGroup(g)
    }
}

impl From<Request> for Document {
    fn from(r: Request) -> Self {
        Self::Request(r)
    }
}

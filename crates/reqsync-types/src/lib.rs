//! Foundation types for reqsync.
//!
//! Every other reqsync crate depends on `reqsync-types`. It carries the
//! content-addressing primitive and the local document model that the
//! version-control layer snapshots.
//!
//! # Key Types
//!
//! - [`ContentHash`] -- BLAKE3 content address of a blob or commit
//! - [`Document`] -- a versioned document (workspace, folder, or request)
//! - [`Project`] -- local container record, optionally linked to a remote team
//! - [`BackendProject`] -- remote description of a shared project

pub mod document;
pub mod error;
pub mod hash;
pub mod ids;
pub mod project;

pub use document::{
    Document, DocumentId, DocumentType, Request, RequestGroup, RequestHeader, Workspace,
    WorkspaceScope,
};
pub use error::TypeError;
pub use hash::ContentHash;
pub use ids::{generate_id, now_millis};
pub use project::{BackendProject, Project, Team};

/// Name of the branch every project starts on.
pub const DEFAULT_BRANCH_NAME: &str = "master";

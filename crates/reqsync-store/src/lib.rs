//! Storage layer for reqsync.
//!
//! A [`Driver`] is a byte-oriented key-value backend; [`MemoryDriver`] and
//! [`FsDriver`] are interchangeable implementations. The [`ObjectStore`]
//! sits on a driver and keeps immutable, content-addressed blobs and commit
//! records, optionally delta-encoded and zstd-compressed at rest.

pub mod driver;
pub mod error;
pub mod fs;
pub mod hasher;
pub mod memory;
pub mod object;
pub mod options;
pub mod store;

pub use driver::{validate_key, Driver};
pub use error::{StoreError, StoreResult};
pub use fs::FsDriver;
pub use hasher::ContentHasher;
pub use memory::MemoryDriver;
pub use object::{DeltaObject, ObjectKind, StoredObject};
pub use options::StoreOptions;
pub use store::ObjectStore;

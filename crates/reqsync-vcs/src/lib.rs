//! Version control for reqsync documents.
//!
//! A [`Vcs`] binds to one backend project, keeps a current branch and a
//! staging area, writes commits into a shared object store, and exchanges
//! history with a [`Remote`] by fast-forward only.
//!
//! # Key Types
//!
//! - [`Vcs`] -- per-project version-control instance
//! - [`VersionControl`] -- async seam used by project reconciliation
//! - [`Commit`] / [`SnapshotEntry`] -- immutable, content-addressed history
//! - [`Remote`] / [`StoreRemote`] -- remote contract and a driver-backed emulation

pub mod branch;
pub mod commit;
pub mod config;
pub mod control;
pub mod error;
pub mod meta;
pub mod names;
pub mod remote;
pub mod stage;
pub mod vcs;

pub use branch::Branch;
pub use commit::{Commit, Snapshot, SnapshotEntry};
pub use config::VcsConfig;
pub use control::VersionControl;
pub use error::{VcsError, VcsResult};
pub use meta::{known_projects, ProjectMeta};
pub use names::validate_branch_name;
pub use remote::{Remote, RemoteHistory, RemoteScope, StoreRemote};
pub use stage::{Change, StatusEntry, WorkingStatus};
pub use vcs::{CheckoutDelta, CommitOutcome, MergeStatus, PullOutcome, PushOutcome, Vcs};

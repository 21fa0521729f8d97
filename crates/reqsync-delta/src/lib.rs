//! Delta compression for reqsync.
//!
//! Computes a compact edit script between two byte sequences and replays it
//! to reconstruct the target. The object store uses scripts to keep older
//! document versions as small deltas against a base blob.
//!
//! # Key Types
//!
//! - [`DeltaScript`] / [`DeltaOp`] -- ordered copy/insert operations
//! - [`diff`] -- compute a script from a source and a target
//! - [`patch`] -- apply a script to its source

pub mod diff;
pub mod error;
pub mod patch;
pub mod rolling;
pub mod script;

pub use diff::{diff, DEFAULT_CHUNK_SIZE};
pub use error::{DeltaError, DeltaResult};
pub use patch::patch;
pub use script::{DeltaOp, DeltaScript};

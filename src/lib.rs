//! Longhorn PVC restore tooling
//!
//! Two cooperating tools for restoring PersistentVolumeClaims from Longhorn
//! backups stored in S3-compatible object storage:
//!
//! - `pvc-mapping-sync` keeps a JSON mapping of every bound PVC to its
//!   Longhorn volume in sync with live cluster state.
//! - `pvc-restore` walks that mapping and drives a guided, per-claim restore:
//!   pick a backup, annotate the claim's manifest, apply it, and wait for the
//!   claim to bind, rolling the manifest back on any failure.
//!
//! Running two instances of either tool against the same mapping file or
//! manifest trees is unsupported: both treat those files as single-writer.

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod error;
pub mod manifest;
pub mod mapping;
pub mod prompt;
pub mod restore;
pub mod storage;

pub use error::{Error, Result};

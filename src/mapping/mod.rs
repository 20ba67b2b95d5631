//! PVC-to-volume mapping store
//!
//! The mapping file is a pretty-printed JSON array of
//! `{namespace, pvcName, volumeName}` objects. It is always rewritten as a
//! whole snapshot: the synchronizer writes to a sibling temp file and renames
//! it over the target, so readers never observe a partial write.

pub mod sync;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// One claim-to-volume mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub namespace: String,
    #[serde(rename = "pvcName")]
    pub pvc_name: String,
    #[serde(rename = "volumeName")]
    pub volume_name: String,
}

/// The mapping file on disk
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full mapping snapshot.
    pub fn load(&self) -> Result<Vec<MappingEntry>> {
        let data = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Replace the mapping snapshot atomically (write temp, then rename).
    pub fn write(&self, entries: &[MappingEntry]) -> Result<()> {
        let data = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = entries.len(), "Wrote mapping file");
        Ok(())
    }
}

/// Build mapping entries from a cluster-wide claim listing.
///
/// Claims without a bound volume are skipped (nothing to restore). Duplicate
/// (namespace, name) pairs keep the first occurrence, so a snapshot never
/// holds two entries for the same claim.
pub fn entries_from_claims(claims: &[PersistentVolumeClaim]) -> Vec<MappingEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for claim in claims {
        let name = match claim.metadata.name.as_deref() {
            Some(n) => n,
            None => continue,
        };
        let namespace = claim.metadata.namespace.as_deref().unwrap_or("default");
        let volume = claim
            .spec
            .as_ref()
            .and_then(|s| s.volume_name.as_deref())
            .filter(|v| !v.is_empty());

        let volume = match volume {
            Some(v) => v,
            None => continue,
        };

        if !seen.insert((namespace.to_string(), name.to_string())) {
            continue;
        }

        entries.push(MappingEntry {
            namespace: namespace.to_string(),
            pvc_name: name.to_string(),
            volume_name: volume.to_string(),
        });
    }

    entries
}

//! Manifest locator
//!
//! Finds the YAML manifest file declaring a given PVC among a set of
//! manifest tree roots (e.g. a GitOps checkout). Traversal is sorted by file
//! name so repeated restores against the same tree find the same file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;

/// Resource kind matched in manifest documents
const CLAIM_KIND: &str = "PersistentVolumeClaim";

/// Searches manifest trees for PVC declarations
pub struct ManifestLocator {
    roots: Vec<PathBuf>,
}

impl ManifestLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Find the manifest file declaring `pvc_name` in `namespace`.
    ///
    /// Documents are matched on kind and `metadata.name`; the namespace is
    /// accepted when it appears anywhere in the file's path. That is a
    /// heuristic, not a structural check of the document's own namespace
    /// field, and it can mismatch when directory names are ambiguous. It
    /// mirrors how these trees are conventionally laid out (one directory
    /// per namespace).
    ///
    /// Unreadable or malformed files are skipped. Returns the first match.
    pub fn find(&self, pvc_name: &str, namespace: &str) -> Result<Option<PathBuf>> {
        for root in &self.roots {
            for entry in WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                if !is_yaml(path) {
                    continue;
                }
                if !path.to_string_lossy().contains(namespace) {
                    continue;
                }
                if file_declares_claim(path, pvc_name) {
                    debug!(path = %path.display(), pvc = %pvc_name, "Found manifest");
                    return Ok(Some(path.to_path_buf()));
                }
            }
        }
        Ok(None)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Check whether any document in a (possibly multi-document) YAML file
/// declares the named claim. Parse failures skip the file.
fn file_declares_claim(path: &Path, pvc_name: &str) -> bool {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping unreadable file");
            return false;
        }
    };

    for doc in serde_yaml::Deserializer::from_str(&content) {
        let value = match serde_yaml::Value::deserialize(doc) {
            Ok(v) => v,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping malformed YAML");
                return false;
            }
        };

        let kind = value.get("kind").and_then(|k| k.as_str());
        let name = value
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str());

        if kind == Some(CLAIM_KIND) && name == Some(pvc_name) {
            return true;
        }
    }

    false
}

//! Scoped manifest mutation with a file-copy undo log
//!
//! A `ManifestTransaction` owns the only mutation the restore makes on disk:
//! setting the Longhorn restore annotation in a claim's manifest. Before
//! touching the file it copies it to a sibling `.bak` path; every exit path
//! either moves that copy back over the manifest (rollback / cleanup) or
//! deletes it (operator keeps the annotation). Once the undo log is
//! consumed, further rollback or cleanup calls are no-ops.

use std::fs;
use std::path::{Path, PathBuf};

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::error::{Error, Result};

/// Annotation key Longhorn watches for restore-from-backup
pub const RESTORE_ANNOTATION: &str = "longhorn.io/from-backup";

/// Suffix of the undo-log copy
const UNDO_SUFFIX: &str = ".bak";

/// One guarded mutation of a manifest file
pub struct ManifestTransaction {
    manifest: PathBuf,
    undo: Option<PathBuf>,
}

impl ManifestTransaction {
    /// Open a transaction on `manifest`, creating the undo-log copy first.
    ///
    /// If the copy cannot be made the transaction does not start and the
    /// manifest is untouched.
    pub fn begin(manifest: &Path) -> Result<Self> {
        let mut undo = manifest.as_os_str().to_owned();
        undo.push(UNDO_SUFFIX);
        let undo = PathBuf::from(undo);

        fs::copy(manifest, &undo).map_err(|e| {
            Error::transaction(format!(
                "failed to create undo copy of {}: {}",
                manifest.display(),
                e
            ))
        })?;

        Ok(Self {
            manifest: manifest.to_path_buf(),
            undo: Some(undo),
        })
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    /// Whether the undo-log copy still exists (not yet consumed).
    pub fn undo_available(&self) -> bool {
        self.undo.is_some()
    }

    /// Set the restore annotation and rewrite the manifest in place.
    ///
    /// Returns the annotated claim for the subsequent apply. The file must
    /// hold a single YAML document; multi-document files fail the
    /// transaction.
    pub fn annotate(&self, backup_url: &str) -> Result<PersistentVolumeClaim> {
        let content = fs::read_to_string(&self.manifest)?;
        let mut doc: Value = serde_yaml::from_str(&content)?;

        let root = doc
            .as_mapping_mut()
            .ok_or_else(|| Error::transaction("manifest document is not a mapping"))?;
        let metadata = ensure_mapping(root, "metadata")?;
        let annotations = ensure_mapping(metadata, "annotations")?;
        annotations.insert(
            Value::String(RESTORE_ANNOTATION.to_string()),
            Value::String(backup_url.to_string()),
        );

        fs::write(&self.manifest, serde_yaml::to_string(&doc)?)?;

        serde_yaml::from_value(doc).map_err(Error::Yaml)
    }

    /// Restore the manifest from the undo log, consuming it.
    /// No-op when the undo log was already consumed.
    pub fn rollback(&mut self) -> Result<()> {
        if let Some(undo) = self.undo.take() {
            fs::rename(&undo, &self.manifest)?;
            info!(path = %self.manifest.display(), "Rolled back manifest from undo copy");
        }
        Ok(())
    }

    /// Final cleanup-or-keep step.
    ///
    /// `keep = false` restores the original manifest; `keep = true` drops
    /// the undo copy and leaves the annotation in place. No-op when the
    /// undo log was already consumed (e.g. by rollback).
    pub fn finish(&mut self, keep: bool) -> Result<()> {
        let Some(undo) = self.undo.take() else {
            return Ok(());
        };

        if keep {
            fs::remove_file(&undo)?;
            info!(
                path = %self.manifest.display(),
                "Keeping annotated manifest; remove the '{}' annotation manually once the restore is verified",
                RESTORE_ANNOTATION
            );
        } else {
            fs::rename(&undo, &self.manifest)?;
            info!(path = %self.manifest.display(), "Original manifest restored");
        }
        Ok(())
    }
}

fn ensure_mapping<'a>(parent: &'a mut Mapping, key: &str) -> Result<&'a mut Mapping> {
    parent
        .entry(Value::String(key.to_string()))
        .or_insert_with(|| Value::Mapping(Mapping::new()))
        .as_mapping_mut()
        .ok_or_else(|| Error::transaction(format!("manifest '{}' field is not a mapping", key)))
}

//! Guided restore workflow
//!
//! Walks the mapping entries strictly in order and drives one guarded
//! restore per claim: resolve backups, let the operator choose, annotate the
//! manifest inside a file-copy transaction, apply it, and wait for the claim
//! to bind. Any failure rolls the manifest back to its pre-transaction bytes
//! and the run moves on; a single claim can never abort the whole workflow.
//!
//! If the apply already reached the cluster before a later step failed, no
//! compensating delete is issued. Only the local manifest is rolled back and
//! the partially-created claim is left for the operator to inspect.

pub mod transaction;

pub use transaction::{ManifestTransaction, RESTORE_ANNOTATION};

use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::catalog::{BackupCatalog, BackupRecord};
use crate::cluster::{ClaimOps, BOUND_PHASE};
use crate::config::WaitOptions;
use crate::error::{Error, Result};
use crate::manifest::ManifestLocator;
use crate::mapping::MappingEntry;
use crate::prompt::{BackupChoice, Prompt};
use crate::storage::ObjectStore;

/// Build the Longhorn restore-source reference for a chosen backup.
pub fn backup_url(bucket: &str, backup: &BackupRecord) -> String {
    format!(
        "s3://{}@/longhorn/?backup={}&volume={}",
        bucket, backup.name, backup.volume_id
    )
}

/// How processing one mapping entry ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Claim reached Bound with the chosen backup
    Restored,
    /// Operator declined or made no valid selection
    Declined,
    /// Volume has no backups in the catalog
    NoBackups,
    /// Listing the catalog failed for this volume
    CatalogError,
    /// No manifest file found for the claim
    ManifestMissing,
    /// Transaction failed and the manifest was rolled back
    Failed,
}

/// The interactive restore workflow
pub struct RestoreRunner<S: ObjectStore, C: ClaimOps, P: Prompt> {
    catalog: BackupCatalog<S>,
    claims: C,
    prompt: P,
    locator: ManifestLocator,
    bucket: String,
    wait: WaitOptions,
}

impl<S: ObjectStore, C: ClaimOps, P: Prompt> RestoreRunner<S, C, P> {
    pub fn new(
        catalog: BackupCatalog<S>,
        claims: C,
        prompt: P,
        locator: ManifestLocator,
        bucket: String,
        wait: WaitOptions,
    ) -> Self {
        Self {
            catalog,
            claims,
            prompt,
            locator,
            bucket,
            wait,
        }
    }

    /// Process every mapping entry in order. Returns one outcome per entry.
    pub async fn run(&mut self, entries: &[MappingEntry]) -> Vec<EntryOutcome> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            info!(
                namespace = %entry.namespace,
                pvc = %entry.pvc_name,
                volume = %entry.volume_name,
                "Processing claim"
            );
            outcomes.push(self.process_entry(entry).await);
        }
        outcomes
    }

    async fn process_entry(&mut self, entry: &MappingEntry) -> EntryOutcome {
        let backups = match self.catalog.list_backups(&entry.volume_name).await {
            Ok(backups) => backups,
            Err(e) => {
                warn!(volume = %entry.volume_name, error = %e, "Skipping: failed to list backups");
                return EntryOutcome::CatalogError;
            }
        };
        if backups.is_empty() {
            info!(volume = %entry.volume_name, "Skipping: no backups found");
            return EntryOutcome::NoBackups;
        }

        let chosen = match self.choose(entry, &backups) {
            Ok(Some(backup)) => backup,
            Ok(None) => {
                info!(pvc = %entry.pvc_name, "Skipping: operator declined");
                return EntryOutcome::Declined;
            }
            Err(e) => {
                error!(pvc = %entry.pvc_name, error = %e, "Skipping: prompt failed");
                return EntryOutcome::Declined;
            }
        };

        let manifest_path = match self.locator.find(&entry.pvc_name, &entry.namespace) {
            Ok(Some(path)) => path,
            _ => {
                warn!(
                    namespace = %entry.namespace,
                    pvc = %entry.pvc_name,
                    "Skipping: no manifest found"
                );
                return EntryOutcome::ManifestMissing;
            }
        };
        info!(path = %manifest_path.display(), "Found manifest");

        let mut tx = match ManifestTransaction::begin(&manifest_path) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "Skipping: undo copy failed");
                return EntryOutcome::Failed;
            }
        };

        let outcome = match self.execute(&tx, entry, &chosen).await {
            Ok(()) => {
                info!(
                    namespace = %entry.namespace,
                    pvc = %entry.pvc_name,
                    backup = %chosen.name,
                    "Successfully restored claim"
                );
                EntryOutcome::Restored
            }
            Err(e) => {
                warn!(pvc = %entry.pvc_name, error = %e, "Restore failed, rolling back manifest");
                if let Err(e) = tx.rollback() {
                    error!(
                        path = %manifest_path.display(),
                        error = %e,
                        "Rollback failed, manifest may still carry the restore annotation"
                    );
                }
                EntryOutcome::Failed
            }
        };

        // Unconditional cleanup-or-keep choice; skipped only when rollback
        // already consumed the undo copy.
        if tx.undo_available() {
            let keep = self.prompt.keep_annotation(tx.manifest()).unwrap_or(false);
            if let Err(e) = tx.finish(keep) {
                error!(path = %manifest_path.display(), error = %e, "Cleanup step failed");
            }
        }

        outcome
    }

    /// Resolve the operator's backup choice. `None` means skip the entry.
    fn choose(
        &mut self,
        entry: &MappingEntry,
        backups: &[BackupRecord],
    ) -> Result<Option<BackupRecord>> {
        match self.prompt.choose_backup(entry, &backups[0])? {
            BackupChoice::AcceptLatest => Ok(Some(backups[0].clone())),
            BackupChoice::PickFromList => Ok(self
                .prompt
                .select_backup(backups)?
                .map(|i| backups[i].clone())),
            BackupChoice::Decline => Ok(None),
        }
    }

    /// The forward path of the transaction: annotate, apply, wait for Bound.
    async fn execute(
        &self,
        tx: &ManifestTransaction,
        entry: &MappingEntry,
        backup: &BackupRecord,
    ) -> Result<()> {
        let url = backup_url(&self.bucket, backup);
        let claim = tx.annotate(&url)?;

        info!(namespace = %entry.namespace, url = %url, "Applying annotated manifest");
        self.claims.apply(&entry.namespace, &claim).await?;

        self.wait_for_bound(&entry.pvc_name, &entry.namespace).await
    }

    /// Poll the claim's phase until it reaches Bound or the deadline passes.
    /// Transient read errors are logged and retried.
    async fn wait_for_bound(&self, name: &str, namespace: &str) -> Result<()> {
        info!(pvc = %name, "Waiting for claim to become Bound");
        let deadline = Instant::now() + self.wait.timeout;

        loop {
            match self.claims.phase(name, namespace).await {
                Ok(Some(phase)) if phase == BOUND_PHASE => return Ok(()),
                Ok(phase) => {
                    info!(pvc = %name, phase = phase.as_deref().unwrap_or("Pending"), "Still waiting");
                }
                Err(e) => {
                    warn!(pvc = %name, error = %e, "Transient error reading claim status");
                }
            }

            if Instant::now() >= deadline {
                return Err(Error::transaction(format!(
                    "PVC '{}/{}' did not become Bound within {:?}",
                    namespace, name, self.wait.timeout
                )));
            }
            tokio::time::sleep(self.wait.poll_interval).await;
        }
    }
}

//! Longhorn backup catalog resolver
//!
//! Longhorn lays its backupstore out as a two-level hash-bucketed tree keyed
//! by volume name:
//!
//! ```text
//! longhorn/backupstore/volumes/<id[0:2]>/<id[2:4]>/<id>/backups/<backup>/backup.cfg
//! ```
//!
//! Each backup directory carries a `backup.cfg` JSON object with the backup
//! name, source volume and creation time. The resolver enumerates the backup
//! directories for one volume and returns their records newest-first.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::ObjectStore;

/// Root of the Longhorn backupstore inside the bucket
pub const LONGHORN_BASE_PATH: &str = "longhorn/backupstore";

/// Timestamp format used by Longhorn in `backup.cfg`
const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One point-in-time backup of a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub name: String,
    pub volume_id: String,
    pub created_at: DateTime<Utc>,
}

/// On-disk shape of `backup.cfg`
#[derive(Debug, Deserialize)]
struct BackupConfig {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "VolumeName")]
    volume_name: String,
    #[serde(rename = "Created")]
    created: String,
}

/// Build the catalog prefix under which a volume's backups live.
///
/// The two bucket segments are the first two and next two characters of the
/// volume id; ids shorter than four characters use whatever is there.
pub fn backup_list_prefix(volume_id: &str) -> String {
    let first = &volume_id[..volume_id.len().min(2)];
    let second = if volume_id.len() > 2 {
        &volume_id[2..volume_id.len().min(4)]
    } else {
        ""
    };
    format!(
        "{}/volumes/{}/{}/{}/backups/",
        LONGHORN_BASE_PATH, first, second, volume_id
    )
}

/// Read-only view of the backup catalog for one bucket
pub struct BackupCatalog<S: ObjectStore> {
    store: S,
}

impl<S: ObjectStore> BackupCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// List all backups recorded for `volume_id`, newest first.
    ///
    /// A volume with no backup prefix yields `Ok(vec![])`. A backup directory
    /// whose `backup.cfg` is missing or unparseable is a hard error for the
    /// whole volume: the operator must never be shown a partial choice list.
    pub async fn list_backups(&self, volume_id: &str) -> Result<Vec<BackupRecord>> {
        let prefix = backup_list_prefix(volume_id);
        let backup_dirs = self.store.list_common_prefixes(&prefix).await?;

        let mut records = Vec::with_capacity(backup_dirs.len());
        for dir in &backup_dirs {
            let backup_name = match dir.trim_end_matches('/').rsplit('/').next() {
                Some(name) if !name.is_empty() => name,
                _ => {
                    return Err(Error::catalog(
                        volume_id,
                        format!("unexpected catalog entry '{}'", dir),
                    ))
                }
            };

            let cfg_key = format!("{}{}/backup.cfg", prefix, backup_name);
            let body = self.store.get(&cfg_key).await?.ok_or_else(|| {
                Error::catalog(volume_id, format!("missing metadata object '{}'", cfg_key))
            })?;

            let cfg: BackupConfig = serde_json::from_slice(&body).map_err(|e| {
                Error::catalog(volume_id, format!("invalid metadata in '{}': {}", cfg_key, e))
            })?;

            let created_at = NaiveDateTime::parse_from_str(&cfg.created, CREATED_FORMAT)
                .map(|dt| dt.and_utc())
                .map_err(|e| {
                    Error::catalog(
                        volume_id,
                        format!("invalid Created timestamp '{}': {}", cfg.created, e),
                    )
                })?;

            records.push(BackupRecord {
                name: cfg.name,
                volume_id: cfg.volume_name,
                created_at,
            });
        }

        // Stable: equal timestamps keep catalog enumeration order.
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        debug!(volume = %volume_id, backups = records.len(), "Resolved backup catalog");
        Ok(records)
    }
}

//! Mapping synchronizer
//!
//! Keeps the mapping file a faithful snapshot of every bound claim in the
//! cluster. The loop is deliberately simple: one full list on startup, then a
//! raw watch on claims with a server-side timeout. Every add/update/delete
//! event triggers a short settle pause followed by a full re-list and
//! rewrite; the mapping is small, so consistency wins over incrementality.
//!
//! The watch stream ending is steady-state behavior, not a failure: the
//! server closes it at the configured timeout, and HTTP 410 means our resume
//! position aged out. Both paths go straight back to a fresh list. Any other
//! API error backs off for a fixed interval and retries; the loop never
//! exits on its own.

use futures::TryStreamExt;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{Api, ListParams, WatchParams};
use kube::core::{ErrorResponse, WatchEvent};
use kube::Client;
use tracing::{info, warn};

use crate::config::SyncOptions;
use crate::error::Result;
use crate::mapping::{entries_from_claims, MappingStore};

/// HTTP status the API server uses for an expired resume position
const GONE: u16 = 410;

/// How one watch cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Server-side timeout elapsed; reconnect from a fresh list
    Expired,
    /// Resume position too old (HTTP 410); reconnect from a fresh list
    Invalidated,
    /// Any other in-stream API error; back off before reconnecting
    Degraded(String),
}

/// Map an in-stream error event to the loop's next action.
pub fn classify_error_event(status: &ErrorResponse) -> WatchOutcome {
    if status.code == GONE {
        WatchOutcome::Invalidated
    } else {
        WatchOutcome::Degraded(format!("{} ({})", status.message, status.code))
    }
}

/// The synchronizer daemon
pub struct Synchronizer {
    client: Client,
    store: MappingStore,
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(client: Client, store: MappingStore, options: SyncOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    /// Run the sync loop until the surrounding task is cancelled.
    pub async fn run(&self) {
        loop {
            let resource_version = match self.bootstrap().await {
                Ok(rv) => rv,
                Err(e) => {
                    warn!(error = %e, "Full sync failed, retrying after backoff");
                    tokio::time::sleep(self.options.retry_backoff).await;
                    continue;
                }
            };

            match self.watch_claims(&resource_version).await {
                Ok(WatchOutcome::Expired) => {
                    info!("Watch stream expired, re-syncing");
                }
                Ok(WatchOutcome::Invalidated) => {
                    info!("Resource version too old, restarting watch");
                }
                Ok(WatchOutcome::Degraded(msg)) => {
                    warn!(error = %msg, "Watch degraded, retrying after backoff");
                    tokio::time::sleep(self.options.retry_backoff).await;
                }
                Err(e) => {
                    warn!(error = %e, "Watch failed, retrying after backoff");
                    tokio::time::sleep(self.options.retry_backoff).await;
                }
            }
        }
    }

    /// List all claims cluster-wide and overwrite the mapping snapshot.
    ///
    /// Returns the list's resource version, the resume position for the
    /// following watch.
    async fn bootstrap(&self) -> Result<String> {
        let api: Api<PersistentVolumeClaim> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;

        let entries = entries_from_claims(&list.items);
        self.store.write(&entries)?;
        info!(
            entries = entries.len(),
            path = %self.store.path().display(),
            "Updated mapping file"
        );

        Ok(list.metadata.resource_version.unwrap_or_default())
    }

    /// Consume one watch stream until it ends or errors.
    async fn watch_claims(&self, resource_version: &str) -> Result<WatchOutcome> {
        let api: Api<PersistentVolumeClaim> = Api::all(self.client.clone());
        let params = WatchParams::default().timeout(self.options.watch_timeout.as_secs() as u32);

        let mut stream = Box::pin(api.watch(&params, resource_version).await?);
        while let Some(event) = stream.try_next().await? {
            match event {
                WatchEvent::Added(claim) | WatchEvent::Modified(claim) => {
                    self.handle_change("updated", &claim).await?;
                }
                WatchEvent::Deleted(claim) => {
                    self.handle_change("deleted", &claim).await?;
                }
                WatchEvent::Bookmark(_) => {}
                WatchEvent::Error(status) => return Ok(classify_error_event(&status)),
            }
        }

        Ok(WatchOutcome::Expired)
    }

    /// React to one change event: settle, then re-snapshot the whole mapping.
    async fn handle_change(&self, kind: &str, claim: &PersistentVolumeClaim) -> Result<()> {
        info!(
            change = kind,
            name = claim.metadata.name.as_deref().unwrap_or("unknown"),
            namespace = claim.metadata.namespace.as_deref().unwrap_or("unknown"),
            "Claim change detected"
        );

        tokio::time::sleep(self.options.settle_interval).await;
        self.bootstrap().await?;
        Ok(())
    }
}

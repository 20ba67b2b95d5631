//! Guided PVC restoration
//!
//! Entry point for the interactive restore workflow. Reads the mapping file
//! written by `pvc-mapping-sync`, then walks each claim through backup
//! selection, manifest annotation, apply and bound-wait.

use anyhow::Context;
use kube::Client;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use longhorn_pvc_restore::{
    catalog::BackupCatalog,
    cluster::KubeClaims,
    config::{RestoreConfig, S3Config},
    manifest::ManifestLocator,
    mapping::MappingStore,
    prompt::ConsolePrompt,
    restore::{EntryOutcome, RestoreRunner},
    storage::S3Store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting guided PVC restoration");

    let s3_config = S3Config::from_env()?;
    let restore_config = RestoreConfig::from_env();

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let store = MappingStore::new(&restore_config.mapping_file);
    let entries = store.load().with_context(|| {
        format!(
            "failed to read mapping file '{}'",
            restore_config.mapping_file.display()
        )
    })?;
    info!(entries = entries.len(), "Loaded volume mapping");

    let bucket = s3_config.bucket.clone();
    let mut runner = RestoreRunner::new(
        BackupCatalog::new(S3Store::new(&s3_config)?),
        KubeClaims::new(client),
        ConsolePrompt,
        ManifestLocator::new(restore_config.manifest_roots),
        bucket,
        restore_config.wait,
    );

    let outcomes = runner.run(&entries).await;
    let restored = outcomes
        .iter()
        .filter(|o| **o == EntryOutcome::Restored)
        .count();
    let failed = outcomes
        .iter()
        .filter(|o| **o == EntryOutcome::Failed)
        .count();
    info!(
        claims = entries.len(),
        restored = restored,
        failed = failed,
        "Guided restoration complete"
    );

    Ok(())
}

/// Initialize tracing subscriber
///
/// Logs go to stderr so the operator prompts on stdout stay readable.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,kube=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

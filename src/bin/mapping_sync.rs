//! PVC-to-volume mapping synchronizer daemon
//!
//! Keeps the mapping file current by listing and watching claims until a
//! shutdown signal arrives.

use kube::Client;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use longhorn_pvc_restore::{
    config::{self, SyncOptions},
    mapping::{sync::Synchronizer, MappingStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting PVC mapping synchronizer");

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let store = MappingStore::new(config::mapping_file_path());
    let synchronizer = Synchronizer::new(client, store, SyncOptions::default());

    tokio::select! {
        _ = synchronizer.run() => {}
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping synchronizer");
        }
    }

    info!("PVC mapping synchronizer stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,kube=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

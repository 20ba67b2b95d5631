//! Environment-driven configuration
//!
//! Both binaries run outside the cluster on an operator workstation, so
//! object-store credentials come from the environment rather than Kubernetes
//! secrets. Missing configuration is fatal before any work starts.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default S3 region when `S3_REGION` is unset (MinIO and most Longhorn
/// backup targets ignore the region but the signature requires one).
const DEFAULT_REGION: &str = "us-east-1";

/// Resolved S3 connection settings
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl S3Config {
    /// Load S3 settings from the environment.
    ///
    /// Requires `S3_ENDPOINT_URL`, `AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY` and `S3_BUCKET_NAME`; `S3_REGION` is optional.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            endpoint: require_env("S3_ENDPOINT_URL")?,
            region: env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            bucket: require_env("S3_BUCKET_NAME")?,
            access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
        })
    }
}

/// Settings for the guided restore workflow
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    /// Path of the mapping file written by `pvc-mapping-sync`
    pub mapping_file: PathBuf,
    /// Roots searched for PVC manifest files
    pub manifest_roots: Vec<PathBuf>,
    /// Bound-state polling settings
    pub wait: WaitOptions,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            mapping_file: mapping_file_path(),
            manifest_roots: vec![PathBuf::from("apps"), PathBuf::from("databases")],
            wait: WaitOptions::default(),
        }
    }
}

impl RestoreConfig {
    /// Build restore settings from the environment, falling back to
    /// defaults. `MANIFEST_ROOTS` is a comma-separated list of directories.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(roots) = env::var("MANIFEST_ROOTS") {
            let roots: Vec<PathBuf> = roots
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(PathBuf::from)
                .collect();
            if !roots.is_empty() {
                config.manifest_roots = roots;
            }
        }
        config
    }
}

/// Path of the mapping file, `MAPPING_FILE` or the conventional default.
pub fn mapping_file_path() -> PathBuf {
    env::var_os("MAPPING_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("longhorn-volume-mapping.json"))
}

/// Polling interval and deadline for the bound-state wait
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Settings for the mapping synchronizer loop
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Server-side watch timeout; the stream is expected to end this often
    pub watch_timeout: Duration,
    /// Pause after a change event before re-listing, letting the control
    /// plane finish propagating related state
    pub settle_interval: Duration,
    /// Pause before reconnecting after an unexpected API error
    pub retry_backoff: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            watch_timeout: Duration::from_secs(60),
            settle_interval: Duration::from_secs(2),
            retry_backoff: Duration::from_secs(10),
        }
    }
}

fn require_env(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::config(format!(
            "environment variable {} must be set",
            name
        ))),
    }
}

//! Error types for the PVC restore tools

use thiserror::Error;

/// Result type alias using the tool's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Tool error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object storage request error
    #[error("Storage error during {op}: {message}")]
    Storage { op: String, message: String },

    /// Backup catalog error (malformed or unreadable backup metadata)
    #[error("Backup catalog error for volume '{volume}': {message}")]
    Catalog { volume: String, message: String },

    /// Restore transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Operator prompt error (stdin closed or unreadable)
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML document error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a storage error with the failing operation attached
    pub fn storage(op: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Storage {
            op: op.into(),
            message: message.into(),
        }
    }

    /// Create a catalog error for a specific volume
    pub fn catalog(volume: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Catalog {
            volume: volume.into(),
            message: message.into(),
        }
    }

    /// Create a transaction error
    pub fn transaction(msg: impl Into<String>) -> Self {
        Error::Transaction(msg.into())
    }
}

//! Error types for the nr-app service layer.

use std::path::PathBuf;

/// Application error type wrapping the engine crates' errors behind one
/// interface for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read config file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read model file: {path}")]
    ModelFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Model file error: {0}")]
    Model(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] nr_graph::GraphError),

    #[error("Reference points error: {0}")]
    References(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Sync error: {0}")]
    Sync(#[from] nr_sync::SyncError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for nr-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<nr_rules::RulesError> for AppError {
    fn from(err: nr_rules::RulesError) -> Self {
        match err {
            nr_rules::RulesError::Config(e) => AppError::Config(e.to_string()),
            other => AppError::References(other.to_string()),
        }
    }
}

impl From<nr_store::StoreError> for AppError {
    fn from(err: nr_store::StoreError) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<nr_core::CollabError> for AppError {
    fn from(err: nr_core::CollabError) -> Self {
        AppError::Store(err.to_string())
    }
}

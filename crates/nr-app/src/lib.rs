//! Shared application service layer for netrecon.
//!
//! This crate gives the CLI one interface over the engine: configuration
//! loading, the file-backed model collaborator, the shared collaborator
//! set, and the `validate` and `sync` commands with progress reporting.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod ledger_service;
pub mod model_file;
pub mod progress;
pub mod sync_service;
pub mod validate_service;

// Re-export key types for convenience
pub use collaborators::Collaborators;
pub use config::{EngineConfig, SyncSection, load_config};
pub use error::{AppError, AppResult};
pub use ledger_service::{
    acknowledge_finding, list_findings, open_store, read_audit, resolve_conflict,
};
pub use model_file::{FileModel, ModelDocument};
pub use progress::{CycleProgressEvent, CycleStage};
pub use sync_service::{SyncRequest, sync, sync_with_progress};
pub use validate_service::{load_references, validate};

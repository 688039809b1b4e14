//! nr-store: reconciliation store and audit log.
//!
//! The store holds the last-synced view of every entity, the findings table
//! and the append-only audit table. `FileStore` keeps them as JSON files in
//! one directory; `MemoryStore` is for tests.

pub mod audit;
pub mod file;
pub mod memory;
pub mod store;
pub mod types;

pub use audit::{AuditSink, JsonlAuditLog, MemoryAuditLog};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{StoreCollaborator, WriterClaim};
pub use types::*;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Finding not found: {0}")]
    FindingNotFound(String),
}

impl From<StoreError> for nr_core::CollabError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => nr_core::CollabError::unavailable("store", e.to_string()),
            other => nr_core::CollabError::rejected("store", other.to_string()),
        }
    }
}

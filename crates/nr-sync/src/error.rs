//! Sync error taxonomy.

use std::fmt;

use nr_core::{CollabError, EntityId};
use nr_graph::GraphError;
use nr_rules::FindingStatus;
use thiserror::Error;

use crate::state::SyncState;

pub type SyncResult<T> = Result<T, SyncError>;

/// Which collaborator a write was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Model,
    Store,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Model => f.write_str("model"),
            Side::Store => f.write_str("store"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// A collaborator could not be read after retries.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(CollabError),

    /// The model snapshot is internally inconsistent; nothing was written.
    #[error("Inconsistent snapshot: {0}")]
    IncompleteEntity(GraphError),

    /// Both sides changed since the last sync.
    #[error("Write conflict on {id}: both sides changed since last sync")]
    WriteConflict { id: EntityId },

    /// A write failed after retries.
    #[error("Write of {id} to {side} failed: {source}")]
    WritebackFailure {
        id: EntityId,
        side: Side,
        #[source]
        source: CollabError,
    },

    /// The audit sink refused a record; the cycle cannot continue.
    #[error("Audit log unavailable: {0}")]
    AuditUnavailable(CollabError),

    /// Another cycle is reconciling this entity right now.
    #[error("Reconciliation of {id} already in flight")]
    InFlight { id: EntityId },

    #[error("Sync cycle cancelled")]
    Cancelled,

    #[error("Entity {id} is {state}, not in conflict")]
    NotInConflict { id: EntityId, state: SyncState },

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Finding not found: {0}")]
    FindingNotFound(String),

    #[error("Finding {id} is {status:?} and cannot be acknowledged")]
    FindingState { id: String, status: FindingStatus },
}

impl SyncError {
    /// Errors after which the running cycle must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::AuditUnavailable(_)
                | SyncError::IncompleteEntity(_)
                | SyncError::SourceUnavailable(_)
        )
    }
}

impl From<GraphError> for SyncError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::SourceUnavailable(e) => SyncError::SourceUnavailable(e),
            other => SyncError::IncompleteEntity(other),
        }
    }
}

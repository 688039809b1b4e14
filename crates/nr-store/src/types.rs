//! Persisted record types.

use chrono::{DateTime, Utc};
use nr_core::{EntityId, EntityKind, Revision};
use nr_graph::Entity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the last reconciliation decided for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingDirection {
    #[default]
    None,
    ToStore,
    ToModel,
    Conflict,
}

/// Per-entity sync bookkeeping.
///
/// `last_model` and `last_store` are the stamps both sides carried when the
/// entity was last reconciled. `base` holds the field values agreed at that
/// point, which is the common ancestor shown when a conflict is reviewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub entity_id: EntityId,
    pub entity_kind: EntityKind,
    pub last_model: Revision,
    pub last_store: Revision,
    #[serde(default)]
    pub pending: PendingDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<Entity>,
    pub updated_at: DateTime<Utc>,
}

impl SyncRecord {
    /// Record for an entity both sides agree on.
    pub fn in_sync(entity: &Entity, last_model: Revision, last_store: Revision) -> Self {
        Self {
            entity_id: entity.id().clone(),
            entity_kind: entity.kind(),
            last_model,
            last_store,
            pending: PendingDirection::None,
            base: Some(entity.clone()),
            updated_at: Utc::now(),
        }
    }

    /// Same stamps, new pending direction.
    pub fn with_pending(mut self, pending: PendingDirection) -> Self {
        self.pending = pending;
        self.updated_at = Utc::now();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Validate,
    PersistFindings,
    PushToStore,
    RefreshSyncState,
    ProposeWriteback,
    Writeback,
    Conflict,
    ResolveConflict,
    AcknowledgeFinding,
    CycleCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Written before a collaborator write; followed by the final outcome.
    Started,
    Succeeded,
    Failed { error: String },
    Skipped { reason: String },
}

/// One append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operation: AuditOperation,
    #[serde(default)]
    pub entity_ids: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    pub fn new(cycle_id: Uuid, operation: AuditOperation, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_id,
            timestamp: Utc::now(),
            operation,
            entity_ids: Vec::new(),
            before: None,
            after: None,
            outcome,
        }
    }

    pub fn entities(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.entity_ids = ids.into_iter().collect();
        self
    }

    pub fn entity(self, id: EntityId) -> Self {
        self.entities([id])
    }

    pub fn before<T: Serialize>(mut self, value: &T) -> Self {
        self.before = serde_json::to_value(value).ok();
        self
    }

    pub fn after<T: Serialize>(mut self, value: &T) -> Self {
        self.after = serde_json::to_value(value).ok();
        self
    }
}

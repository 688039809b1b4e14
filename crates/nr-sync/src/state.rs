//! Per-entity sync state from revision stamps.

use std::fmt;

use nr_core::Revision;
use nr_graph::Entity;
use nr_store::{PendingDirection, SyncRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Neither side moved since the last sync.
    InSync,
    /// Only the model moved: push model values to the store.
    ToStore,
    /// Only the store moved: propose a model writeback.
    ToModel,
    /// Both moved: left for a human.
    Conflict,
    /// Present in the store but not in the model snapshot. Never created.
    Orphaned,
}

impl SyncState {
    pub fn pending(self) -> PendingDirection {
        match self {
            SyncState::InSync | SyncState::Orphaned => PendingDirection::None,
            SyncState::ToStore => PendingDirection::ToStore,
            SyncState::ToModel => PendingDirection::ToModel,
            SyncState::Conflict => PendingDirection::Conflict,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::InSync => "in_sync",
            SyncState::ToStore => "to_store",
            SyncState::ToModel => "to_model",
            SyncState::Conflict => "conflict",
            SyncState::Orphaned => "orphaned",
        };
        f.write_str(s)
    }
}

/// Field equality ignoring revision stamps.
pub fn same_fields(a: &Entity, b: &Entity) -> bool {
    a.clone().with_revision(Revision::ZERO) == b.clone().with_revision(Revision::ZERO)
}

/// Decide what an entity needs.
///
/// `model` and `store` are the current copies (the store copy carries the
/// store revision); `record` holds the stamps agreed at the last sync.
///
/// When both stamps advanced the entity is a conflict, even if the two sides
/// now hold identical values. A recorded conflict stays a conflict until it
/// is resolved explicitly.
pub fn classify(
    model: Option<&Entity>,
    store: Option<&Entity>,
    record: Option<&SyncRecord>,
) -> SyncState {
    let (model, store) = match (model, store) {
        (None, _) => return SyncState::Orphaned,
        (Some(_), None) => return SyncState::ToStore,
        (Some(m), Some(s)) => (m, s),
    };

    let Some(record) = record else {
        // Both sides hold the entity but it was never reconciled.
        return if same_fields(model, store) {
            SyncState::InSync
        } else {
            SyncState::Conflict
        };
    };

    if record.pending == PendingDirection::Conflict {
        return SyncState::Conflict;
    }

    let model_moved = model.revision() > record.last_model;
    let store_moved = store.revision() > record.last_store;
    match (model_moved, store_moved) {
        (false, false) => SyncState::InSync,
        (true, false) => SyncState::ToStore,
        (false, true) => SyncState::ToModel,
        (true, true) => SyncState::Conflict,
    }
}

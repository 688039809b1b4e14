//! Cycle and batch results.

use std::collections::BTreeMap;

use nr_core::{EntityId, Revision};
use nr_rules::FindingKind;
use uuid::Uuid;

use crate::error::SyncError;
use crate::ledger::LedgerDelta;

#[derive(Debug, Clone)]
pub struct EntityFailure {
    pub id: EntityId,
    pub error: SyncError,
}

/// Partial-failure result of one write batch.
///
/// Applied entities keep their new state; a retry only needs `failed`.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub applied: Vec<EntityId>,
    pub failed: Vec<EntityId>,
    pub errors: Vec<EntityFailure>,
}

impl BatchOutcome {
    pub fn succeed(&mut self, id: EntityId) {
        self.applied.push(id);
    }

    pub fn fail(&mut self, id: EntityId, error: SyncError) {
        self.failed.push(id.clone());
        self.errors.push(EntityFailure { id, error });
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: BatchOutcome) {
        self.applied.extend(other.applied);
        self.failed.extend(other.failed);
        self.errors.extend(other.errors);
    }
}

/// A both-sides-changed entity left for manual resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictEntry {
    pub id: EntityId,
    pub model_revision: Revision,
    pub store_revision: Revision,
    pub last_model: Option<Revision>,
    pub last_store: Option<Revision>,
}

/// Everything a caller learns from one sync cycle.
///
/// Produced even when some entities failed.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub cycle_id: Uuid,
    pub dry_run: bool,
    pub findings_by_kind: BTreeMap<FindingKind, usize>,
    pub ledger: LedgerDelta,
    pub in_sync: Vec<EntityId>,
    /// Model -> store pushes applied this cycle.
    pub pushed: Vec<EntityId>,
    /// Store -> model writebacks applied this cycle.
    pub written_back: Vec<EntityId>,
    /// Store -> model changes waiting for review (rejected or dry run).
    pub pending_writeback: Vec<EntityId>,
    /// Model -> store changes not applied because of a dry run.
    pub pending_push: Vec<EntityId>,
    pub conflicts: Vec<ConflictEntry>,
    pub orphaned: Vec<EntityId>,
    pub failures: Vec<EntityFailure>,
}

impl SyncReport {
    pub fn new(cycle_id: Uuid, dry_run: bool) -> Self {
        Self {
            cycle_id,
            dry_run,
            ..Self::default()
        }
    }

    /// Keep a batch's failures and hand back its applied ids.
    pub fn absorb(&mut self, batch: BatchOutcome) -> Vec<EntityId> {
        self.failures.extend(batch.errors);
        batch.applied
    }

    pub fn synced_count(&self) -> usize {
        self.pushed.len() + self.written_back.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn conflicted_count(&self) -> usize {
        self.conflicts.len()
    }

    pub fn failed(&self) -> impl Iterator<Item = &EntityId> {
        self.failures.iter().map(|f| &f.id)
    }

    pub fn is_partial_failure(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn total_findings(&self) -> usize {
        self.findings_by_kind.values().sum()
    }
}

//! Store collaborator interface.

use std::fs::File;

use nr_core::{CollabResult, EntityId, Revision};
use nr_graph::Entity;
use nr_rules::Finding;

use crate::types::SyncRecord;

/// The external record store that mirrors the model.
///
/// Every upsert is keyed by id and replaces the previous row for that id as
/// one unit, so concurrent cycles never interleave fields of one entity.
/// An entity's store-side revision is the `revision` it carries in the
/// entity table; external corrections must advance it.
pub trait StoreCollaborator: Send + Sync {
    fn load_sync_state(&self) -> CollabResult<Vec<SyncRecord>>;

    fn upsert_sync_records(&self, records: &[SyncRecord]) -> CollabResult<()>;

    fn load_findings(&self) -> CollabResult<Vec<Finding>>;

    fn upsert_findings(&self, findings: &[Finding]) -> CollabResult<()>;

    fn load_entities(&self) -> CollabResult<Vec<Entity>>;

    fn upsert_entities(&self, entities: &[Entity]) -> CollabResult<()>;

    /// Replace one entity only while the stored copy still carries
    /// `expected` (`None`: no stored copy yet). Returns `false` and writes
    /// nothing when the stored revision has moved on.
    ///
    /// The check and the write must be one atomic step.
    fn replace_entity(&self, entity: &Entity, expected: Option<Revision>) -> CollabResult<bool>;

    fn load_entity(&self, id: &EntityId) -> CollabResult<Option<Entity>> {
        Ok(self.load_entities()?.into_iter().find(|e| e.id() == id))
    }

    /// Entities whose store revision moved past the last synced store
    /// revision (or that have never been synced).
    fn load_pending_corrections(&self) -> CollabResult<Vec<Entity>> {
        let records = self.load_sync_state()?;
        let synced: std::collections::HashMap<_, _> = records
            .iter()
            .map(|r| (r.entity_id.clone(), r.last_store))
            .collect();
        Ok(self
            .load_entities()?
            .into_iter()
            .filter(|e| synced.get(e.id()).is_none_or(|last| e.revision() > *last))
            .collect())
    }

    /// Exclusive write access for one cycle, across every process sharing
    /// this store. Released when the claim drops.
    ///
    /// Stores reachable from a single process rely on the per-entity locks
    /// alone and keep the default.
    fn claim_writer(&self) -> CollabResult<WriterClaim> {
        Ok(WriterClaim::local())
    }
}

/// Held for the duration of a writing cycle; see
/// [`StoreCollaborator::claim_writer`].
#[derive(Debug, Default)]
pub struct WriterClaim {
    // The OS lock on this file is the claim; closing it releases the lock.
    file: Option<File>,
}

impl WriterClaim {
    pub fn local() -> Self {
        Self::default()
    }

    /// Claim backed by an exclusive lock already taken on `file`.
    pub fn locked(file: File) -> Self {
        Self { file: Some(file) }
    }

    pub fn is_cross_process(&self) -> bool {
        self.file.is_some()
    }
}

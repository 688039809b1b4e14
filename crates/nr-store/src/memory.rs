//! In-memory store for tests.

use std::collections::{BTreeMap, HashMap};

use nr_core::{CollabError, CollabResult, EntityId, Revision};
use nr_graph::Entity;
use nr_rules::Finding;
use parking_lot::{Mutex, RwLock};

use crate::store::StoreCollaborator;
use crate::types::SyncRecord;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<BTreeMap<EntityId, Entity>>,
    sync: RwLock<BTreeMap<EntityId, SyncRecord>>,
    findings: RwLock<BTreeMap<String, Finding>>,
    offline: RwLock<bool>,
    failures: Mutex<HashMap<EntityId, (usize, CollabError)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// External correction: replace fields and advance the store revision.
    pub fn correct(&self, entity: Entity) -> Revision {
        let mut map = self.entities.write();
        let next = map
            .get(entity.id())
            .map_or(entity.revision(), |e| e.revision().max(entity.revision()))
            .next();
        map.insert(entity.id().clone(), entity.with_revision(next));
        next
    }

    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.entities.read().get(id).cloned()
    }

    pub fn sync_record(&self, id: &EntityId) -> Option<SyncRecord> {
        self.sync.read().get(id).cloned()
    }

    pub fn finding(&self, id: &str) -> Option<Finding> {
        self.findings.read().get(id).cloned()
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    /// The next `times` entity upserts touching `id` fail with `err`.
    pub fn fail_upserts(&self, id: impl Into<EntityId>, times: usize, err: CollabError) {
        self.failures.lock().insert(id.into(), (times, err));
    }

    fn check_online(&self) -> CollabResult<()> {
        if *self.offline.read() {
            return Err(CollabError::unavailable("store", "connection refused"));
        }
        Ok(())
    }

    fn injected_failure<'a>(&self, ids: impl IntoIterator<Item = &'a EntityId>) -> CollabResult<()> {
        let mut failures = self.failures.lock();
        for id in ids {
            if let Some((remaining, err)) = failures.get_mut(id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(err.clone());
            }
        }
        Ok(())
    }
}

impl StoreCollaborator for MemoryStore {
    fn load_sync_state(&self) -> CollabResult<Vec<SyncRecord>> {
        self.check_online()?;
        Ok(self.sync.read().values().cloned().collect())
    }

    fn upsert_sync_records(&self, records: &[SyncRecord]) -> CollabResult<()> {
        self.check_online()?;
        let mut map = self.sync.write();
        for r in records {
            map.insert(r.entity_id.clone(), r.clone());
        }
        Ok(())
    }

    fn load_findings(&self) -> CollabResult<Vec<Finding>> {
        self.check_online()?;
        Ok(self.findings.read().values().cloned().collect())
    }

    fn upsert_findings(&self, findings: &[Finding]) -> CollabResult<()> {
        self.check_online()?;
        let mut map = self.findings.write();
        for f in findings {
            map.insert(f.id.clone(), f.clone());
        }
        Ok(())
    }

    fn load_entities(&self) -> CollabResult<Vec<Entity>> {
        self.check_online()?;
        Ok(self.entities.read().values().cloned().collect())
    }

    fn upsert_entities(&self, entities: &[Entity]) -> CollabResult<()> {
        self.check_online()?;
        self.injected_failure(entities.iter().map(Entity::id))?;
        let mut map = self.entities.write();
        for e in entities {
            map.insert(e.id().clone(), e.clone());
        }
        Ok(())
    }

    fn replace_entity(&self, entity: &Entity, expected: Option<Revision>) -> CollabResult<bool> {
        self.check_online()?;
        self.injected_failure([entity.id()])?;
        let mut map = self.entities.write();
        if map.get(entity.id()).map(Entity::revision) != expected {
            return Ok(false);
        }
        map.insert(entity.id().clone(), entity.clone());
        Ok(true)
    }
}

//! Model collaborator interface.

use std::collections::{BTreeMap, HashMap};

use nr_core::{CollabError, CollabResult, EntityId, Revision};
use parking_lot::{Mutex, RwLock};

use crate::entity::{Entity, Pipe, Structure};

/// Read/write view of the authoritative model (the host application).
///
/// The core holds no session state of its own: every operation receives the
/// collaborator explicitly. Identifiers are stable handles assigned by the
/// collaborator. Each `write_entity` call must be atomic for that entity.
pub trait ModelCollaborator: Send + Sync {
    fn list_structures(&self) -> CollabResult<Vec<Structure>>;

    fn list_pipes(&self) -> CollabResult<Vec<Pipe>>;

    /// Overwrite one entity's fields and return the revision the model assigned.
    fn write_entity(&self, id: &EntityId, fields: &Entity) -> CollabResult<Revision>;

    /// Current revision of one entity, `None` when the model has no such id.
    fn revision_of(&self, id: &EntityId) -> CollabResult<Option<Revision>> {
        if let Some(s) = self.list_structures()?.into_iter().find(|s| &s.id == id) {
            return Ok(Some(s.revision));
        }
        Ok(self
            .list_pipes()?
            .into_iter()
            .find(|p| &p.id == id)
            .map(|p| p.revision))
    }
}

/// In-memory model for tests and dry runs.
///
/// Supports failure injection so callers can exercise retry and
/// partial-failure paths.
#[derive(Debug, Default)]
pub struct MemoryModel {
    entities: RwLock<BTreeMap<EntityId, Entity>>,
    offline: RwLock<bool>,
    failures: Mutex<HashMap<EntityId, (usize, CollabError)>>,
    write_log: Mutex<Vec<EntityId>>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let model = Self::new();
        {
            let mut map = model.entities.write();
            for e in entities {
                map.insert(e.id().clone(), e);
            }
        }
        model
    }

    /// Simulate an edit made in the host: replace fields and bump the revision.
    pub fn edit(&self, entity: Entity) -> Revision {
        let mut map = self.entities.write();
        let next = map
            .get(entity.id())
            .map_or(entity.revision(), |e| e.revision())
            .next();
        map.insert(entity.id().clone(), entity.with_revision(next));
        next
    }

    pub fn get(&self, id: &EntityId) -> Option<Entity> {
        self.entities.read().get(id).cloned()
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    /// The next `times` writes for `id` fail with `err`.
    pub fn fail_writes(&self, id: impl Into<EntityId>, times: usize, err: CollabError) {
        self.failures.lock().insert(id.into(), (times, err));
    }

    /// Ids of successful writes, in call order.
    pub fn write_log(&self) -> Vec<EntityId> {
        self.write_log.lock().clone()
    }

    fn check_online(&self) -> CollabResult<()> {
        if *self.offline.read() {
            return Err(CollabError::unavailable("model", "no document open"));
        }
        Ok(())
    }
}

impl ModelCollaborator for MemoryModel {
    fn list_structures(&self) -> CollabResult<Vec<Structure>> {
        self.check_online()?;
        Ok(self
            .entities
            .read()
            .values()
            .filter_map(|e| match e {
                Entity::Structure(s) => Some(s.clone()),
                Entity::Pipe(_) => None,
            })
            .collect())
    }

    fn list_pipes(&self) -> CollabResult<Vec<Pipe>> {
        self.check_online()?;
        Ok(self
            .entities
            .read()
            .values()
            .filter_map(|e| match e {
                Entity::Pipe(p) => Some(p.clone()),
                Entity::Structure(_) => None,
            })
            .collect())
    }

    fn write_entity(&self, id: &EntityId, fields: &Entity) -> CollabResult<Revision> {
        self.check_online()?;
        {
            let mut failures = self.failures.lock();
            if let Some((remaining, err)) = failures.get_mut(id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(err.clone());
            }
        }

        let mut map = self.entities.write();
        let current = map
            .get(id)
            .ok_or_else(|| CollabError::rejected("model", format!("no entity {id}")))?;
        if current.kind() != fields.kind() || fields.id() != id {
            return Err(CollabError::rejected(
                "model",
                format!("fields for {} do not match entity {id}", fields.id()),
            ));
        }
        let next = current.revision().next();
        map.insert(id.clone(), fields.clone().with_revision(next));
        self.write_log.lock().push(id.clone());
        Ok(next)
    }
}

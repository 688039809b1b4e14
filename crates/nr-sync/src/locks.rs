//! At-most-one in-flight reconciliation per entity.

use std::collections::HashSet;
use std::sync::Arc;

use nr_core::EntityId;
use parking_lot::Mutex;

use crate::error::{SyncError, SyncResult};

/// Registry of entities currently being written.
///
/// Share one instance (behind an `Arc`) between coordinators that may run
/// concurrently against the same collaborators.
#[derive(Debug, Default)]
pub struct EntityLocks {
    held: Mutex<HashSet<EntityId>>,
}

impl EntityLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `id`, or fail with `InFlight` if someone else holds it.
    pub fn try_acquire(self: &Arc<Self>, id: &EntityId) -> SyncResult<EntityGuard> {
        let mut held = self.held.lock();
        if !held.insert(id.clone()) {
            return Err(SyncError::InFlight { id: id.clone() });
        }
        Ok(EntityGuard {
            locks: Arc::clone(self),
            id: id.clone(),
        })
    }

    pub fn is_held(&self, id: &EntityId) -> bool {
        self.held.lock().contains(id)
    }
}

/// Releases its entity on drop.
#[derive(Debug)]
pub struct EntityGuard {
    locks: Arc<EntityLocks>,
    id: EntityId,
}

impl EntityGuard {
    pub fn id(&self) -> &EntityId {
        &self.id
    }
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_in_flight_until_release() {
        let locks = EntityLocks::new();
        let id = EntityId::from("S1");
        let guard = locks.try_acquire(&id).unwrap();
        assert!(matches!(
            locks.try_acquire(&id),
            Err(SyncError::InFlight { .. })
        ));
        assert!(locks.try_acquire(&"S2".into()).is_ok());
        drop(guard);
        assert!(!locks.is_held(&id));
        assert!(locks.try_acquire(&id).is_ok());
    }
}

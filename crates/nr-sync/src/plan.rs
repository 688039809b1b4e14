//! Classification of every entity in a cycle.

use std::collections::{BTreeMap, BTreeSet};

use nr_core::EntityId;
use nr_graph::Entity;
use nr_store::{PendingDirection, SyncRecord};
use rayon::prelude::*;
use tracing::debug;

use crate::state::{SyncState, classify};

/// One entity's decision with the inputs it was made from.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPlan {
    pub id: EntityId,
    pub state: SyncState,
    pub model: Option<Entity>,
    pub store: Option<Entity>,
    pub record: Option<SyncRecord>,
}

impl EntityPlan {
    fn new(
        id: EntityId,
        model: Option<Entity>,
        store: Option<Entity>,
        record: Option<SyncRecord>,
    ) -> Self {
        let state = classify(model.as_ref(), store.as_ref(), record.as_ref());
        debug!(entity = %id, %state, "classified");
        Self {
            id,
            state,
            model,
            store,
            record,
        }
    }

    /// In sync, but the stored stamps do not describe the current copies.
    pub fn needs_refresh(&self) -> bool {
        if self.state != SyncState::InSync {
            return false;
        }
        match (&self.model, &self.store, &self.record) {
            (Some(m), Some(s), Some(r)) => {
                r.last_model != m.revision()
                    || r.last_store != s.revision()
                    || r.pending != PendingDirection::None
            }
            (Some(_), Some(_), None) => true,
            _ => false,
        }
    }
}

/// Decisions for every entity known to either side, in id order.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    entries: Vec<EntityPlan>,
}

impl SyncPlan {
    /// Classify the union of model and store entities.
    ///
    /// Entities are independent, so with `parallel` the classification fans
    /// out over the rayon pool.
    pub fn build(
        model: impl IntoIterator<Item = Entity>,
        store: impl IntoIterator<Item = Entity>,
        records: impl IntoIterator<Item = SyncRecord>,
        parallel: bool,
    ) -> Self {
        let mut model: BTreeMap<EntityId, Entity> =
            model.into_iter().map(|e| (e.id().clone(), e)).collect();
        let mut store: BTreeMap<EntityId, Entity> =
            store.into_iter().map(|e| (e.id().clone(), e)).collect();
        let mut records: BTreeMap<EntityId, SyncRecord> = records
            .into_iter()
            .map(|r| (r.entity_id.clone(), r))
            .collect();

        let ids: BTreeSet<EntityId> = model.keys().chain(store.keys()).cloned().collect();
        let inputs: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let m = model.remove(&id);
                let s = store.remove(&id);
                let r = records.remove(&id);
                (id, m, s, r)
            })
            .collect();

        let entries = if parallel {
            inputs
                .into_par_iter()
                .map(|(id, m, s, r)| EntityPlan::new(id, m, s, r))
                .collect()
        } else {
            inputs
                .into_iter()
                .map(|(id, m, s, r)| EntityPlan::new(id, m, s, r))
                .collect()
        };
        Self { entries }
    }

    pub fn entries(&self) -> &[EntityPlan] {
        &self.entries
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityPlan> {
        self.entries
            .binary_search_by(|e| e.id.cmp(id))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn with_state(&self, state: SyncState) -> impl Iterator<Item = &EntityPlan> {
        self.entries.iter().filter(move |e| e.state == state)
    }

    pub fn count(&self, state: SyncState) -> usize {
        self.with_state(state).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::{Revision, point};
    use nr_graph::Structure;

    fn s(id: &str, rev: u64, x: f64) -> Entity {
        Structure::new(id, point(x, 0.0, 0.0))
            .with_revision(Revision::new(rev))
            .into()
    }

    #[test]
    fn parallel_and_sequential_plans_agree() {
        let model: Vec<Entity> = (0..200).map(|i| s(&format!("S{i:03}"), 2, i as f64)).collect();
        let store: Vec<Entity> = (100..300).map(|i| s(&format!("S{i:03}"), 1, i as f64)).collect();
        let records: Vec<SyncRecord> = store
            .iter()
            .map(|e| SyncRecord::in_sync(e, Revision::new(1), Revision::new(1)))
            .collect();

        let a = SyncPlan::build(model.clone(), store.clone(), records.clone(), true);
        let b = SyncPlan::build(model, store, records, false);
        assert_eq!(a.entries(), b.entries());
        assert_eq!(a.count(SyncState::ToStore), 200);
        assert_eq!(a.count(SyncState::Orphaned), 100);
        assert_eq!(a.get(&"S150".into()).map(|e| e.state), Some(SyncState::ToStore));
    }

    #[test]
    fn settled_writeback_needs_refresh() {
        let model = s("S1", 2, 1.0);
        let store = s("S1", 2, 1.0);
        let mut rec = SyncRecord::in_sync(&s("S1", 2, 1.0), Revision::new(2), Revision::new(2));
        rec.pending = PendingDirection::ToModel;
        let plan = SyncPlan::build([model], [store], [rec], false);
        let entry = &plan.entries()[0];
        assert_eq!(entry.state, SyncState::InSync);
        assert!(entry.needs_refresh());
    }
}

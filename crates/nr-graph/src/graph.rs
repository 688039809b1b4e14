//! Core network graph.

use std::collections::{BTreeMap, BTreeSet};

use nr_core::EntityId;
use petgraph::unionfind::UnionFind;

use crate::entity::{Entity, Pipe, PipeEnd, Structure};

/// A validated, immutable point-in-time view of the network.
///
/// The graph stores:
/// - structures and pipes keyed by their collaborator ids
/// - the adjacency index: for each structure, the ids of its incident pipes
///
/// Ordered maps keep iteration deterministic, which the validation engine
/// relies on for idempotent re-runs.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    pub(crate) structures: BTreeMap<EntityId, Structure>,
    pub(crate) pipes: BTreeMap<EntityId, Pipe>,

    /// Structure id -> ids of pipes that start or end there.
    pub(crate) adjacency: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

impl NetworkGraph {
    /// Iterate over all structures in id order.
    pub fn structures(&self) -> impl ExactSizeIterator<Item = &Structure> {
        self.structures.values()
    }

    /// Iterate over all pipes in id order.
    pub fn pipes(&self) -> impl ExactSizeIterator<Item = &Pipe> {
        self.pipes.values()
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    pub fn pipe_count(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty() && self.pipes.is_empty()
    }

    pub fn structure(&self, id: &EntityId) -> Option<&Structure> {
        self.structures.get(id)
    }

    pub fn pipe(&self, id: &EntityId) -> Option<&Pipe> {
        self.pipes.get(id)
    }

    /// Look up either kind of entity by id.
    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.structures
            .get(id)
            .cloned()
            .map(Entity::Structure)
            .or_else(|| self.pipes.get(id).cloned().map(Entity::Pipe))
    }

    /// All entities, structures first, each table in id order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.structures
            .values()
            .cloned()
            .map(Entity::Structure)
            .chain(self.pipes.values().cloned().map(Entity::Pipe))
    }

    /// Ids of pipes incident to a structure (empty for unknown ids).
    pub fn incident_pipes(&self, structure: &EntityId) -> impl Iterator<Item = &EntityId> {
        self.adjacency.get(structure).into_iter().flatten()
    }

    /// Number of pipes incident to a structure.
    pub fn degree(&self, structure: &EntityId) -> usize {
        self.adjacency.get(structure).map_or(0, BTreeSet::len)
    }

    /// The structure a pipe declares at one of its ends.
    pub fn structure_at(&self, pipe: &Pipe, end: PipeEnd) -> Option<&Structure> {
        self.structures.get(pipe.structure_at(end))
    }

    /// Number of disjoint sub-networks, counting isolated structures.
    pub fn network_count(&self) -> usize {
        if self.structures.is_empty() {
            return 0;
        }
        let index: BTreeMap<&EntityId, usize> = self
            .structures
            .keys()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        let mut sets = UnionFind::<usize>::new(index.len());
        for pipe in self.pipes.values() {
            if let (Some(&a), Some(&b)) = (
                index.get(&pipe.start_structure),
                index.get(&pipe.end_structure),
            ) {
                sets.union(a, b);
            }
        }
        let roots: BTreeSet<usize> = (0..index.len()).map(|i| sets.find(i)).collect();
        roots.len()
    }
}

//! Snapshot graph builder.

use std::collections::{BTreeMap, BTreeSet};

use nr_core::EntityId;

use crate::entity::{Pipe, Structure};
use crate::error::GraphResult;
use crate::graph::NetworkGraph;
use crate::validate;

/// Builder for assembling a snapshot into a graph.
///
/// Use `add_structure` and `add_pipe` to collect entities,
/// then call `build()` to validate and freeze them into an immutable `NetworkGraph`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    structures: Vec<Structure>,
    pipes: Vec<Pipe>,
}

impl GraphBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-sized for a snapshot of known size.
    pub fn with_capacity(structures: usize, pipes: usize) -> Self {
        Self {
            structures: Vec::with_capacity(structures),
            pipes: Vec::with_capacity(pipes),
        }
    }

    pub fn add_structure(&mut self, structure: Structure) -> &mut Self {
        self.structures.push(structure);
        self
    }

    pub fn add_pipe(&mut self, pipe: Pipe) -> &mut Self {
        self.pipes.push(pipe);
        self
    }

    pub fn extend_structures(&mut self, structures: impl IntoIterator<Item = Structure>) {
        self.structures.extend(structures);
    }

    pub fn extend_pipes(&mut self, pipes: impl IntoIterator<Item = Pipe>) {
        self.pipes.extend(pipes);
    }

    /// Build and validate the graph, returning an immutable `NetworkGraph`.
    ///
    /// Fails with `IncompleteEntity` when a pipe references a structure that
    /// is not part of the same snapshot.
    pub fn build(self) -> GraphResult<NetworkGraph> {
        validate::validate_structure(&self.structures, &self.pipes)?;

        let structures: BTreeMap<EntityId, Structure> = self
            .structures
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        let pipes: BTreeMap<EntityId, Pipe> =
            self.pipes.into_iter().map(|p| (p.id.clone(), p)).collect();

        let adjacency = Self::build_adjacency(&structures, &pipes);
        validate::validate_adjacency(&pipes, &adjacency)?;

        Ok(NetworkGraph {
            structures,
            pipes,
            adjacency,
        })
    }

    /// One pass over pipes: each pipe is listed under its start and end structure.
    fn build_adjacency(
        structures: &BTreeMap<EntityId, Structure>,
        pipes: &BTreeMap<EntityId, Pipe>,
    ) -> BTreeMap<EntityId, BTreeSet<EntityId>> {
        let mut adjacency: BTreeMap<EntityId, BTreeSet<EntityId>> = structures
            .keys()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();

        for pipe in pipes.values() {
            adjacency
                .entry(pipe.start_structure.clone())
                .or_default()
                .insert(pipe.id.clone());
            adjacency
                .entry(pipe.end_structure.clone())
                .or_default()
                .insert(pipe.id.clone());
        }

        adjacency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::point;

    #[test]
    fn builder_collects_entities() {
        let mut builder = GraphBuilder::new();
        builder
            .add_structure(Structure::new("S1", point(0.0, 0.0, 0.0)))
            .add_structure(Structure::new("S2", point(1.0, 0.0, 0.0)));
        assert_eq!(builder.structures.len(), 2);
        assert!(builder.pipes.is_empty());
    }

    #[test]
    fn builder_build_simple() {
        let s1 = Structure::new("N1", point(0.0, 0.0, 0.0));
        let s2 = Structure::new("N2", point(5.0, 0.0, -0.5));
        let p = Pipe::between("C1", &s1, &s2);

        let mut builder = GraphBuilder::new();
        builder.add_structure(s1).add_structure(s2).add_pipe(p);
        let graph = builder.build().unwrap();

        assert_eq!(graph.structure_count(), 2);
        assert_eq!(graph.pipe_count(), 1);

        // Check adjacency
        assert_eq!(graph.degree(&"N1".into()), 1);
        assert_eq!(graph.degree(&"N2".into()), 1);
    }

    #[test]
    fn self_loop_pipe_listed_once() {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
        let p = Pipe::between("P1", &s1, &s1);
        let mut builder = GraphBuilder::new();
        builder.add_structure(s1).add_pipe(p);
        let graph = builder.build().unwrap();
        assert_eq!(graph.degree(&"S1".into()), 1);
    }
}

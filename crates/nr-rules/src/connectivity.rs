//! Connectivity check: pipe ends must land on a structure or another pipe end.
//!
//! Structure positions and pipe endpoints are bucketed on a grid of cell
//! size epsilon, so each end is compared only against neighbouring cells.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use nr_core::{EntityId, Real, distance};
use nr_graph::{NetworkGraph, PipeEnd, SpatialGrid};

use crate::finding::{Finding, FindingKey, FindingKind};

/// What one pipe end is attached to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndLink {
    /// Structures whose position lies within epsilon of the end.
    pub structures: BTreeSet<EntityId>,
    /// Other pipes with an end within epsilon of this end.
    pub pipes: BTreeSet<EntityId>,
}

impl EndLink {
    pub fn is_connected(&self) -> bool {
        !self.structures.is_empty() || !self.pipes.is_empty()
    }
}

/// Spatial connectivity of every pipe end, plus the pipe pairs that meet.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityIndex {
    ends: BTreeMap<(EntityId, PipeEnd), EndLink>,
    /// Pipe pairs (a < b) sharing a connected endpoint.
    pairs: BTreeSet<(EntityId, EntityId)>,
}

impl ConnectivityIndex {
    pub fn build(graph: &NetworkGraph, eps: Real) -> Self {
        let mut structure_grid = SpatialGrid::new(eps);
        for s in graph.structures() {
            structure_grid.insert(s.position, &s.id);
        }
        let mut end_grid = SpatialGrid::new(eps);
        for p in graph.pipes() {
            for end in PipeEnd::BOTH {
                end_grid.insert(*p.endpoint(end), &p.id);
            }
        }

        let mut ends = BTreeMap::new();
        let mut by_structure: BTreeMap<EntityId, BTreeSet<EntityId>> = BTreeMap::new();
        let mut pairs = BTreeSet::new();

        for p in graph.pipes() {
            for end in PipeEnd::BOTH {
                let at = p.endpoint(end);
                let structures: BTreeSet<EntityId> =
                    structure_grid.within(at, eps).map(|id| (*id).clone()).collect();
                let pipes: BTreeSet<EntityId> = end_grid
                    .within(at, eps)
                    .filter(|id| **id != &p.id)
                    .map(|id| (*id).clone())
                    .collect();

                for s in &structures {
                    by_structure
                        .entry(s.clone())
                        .or_default()
                        .insert(p.id.clone());
                }
                for other in &pipes {
                    pairs.insert(ordered(&p.id, other));
                }
                ends.insert((p.id.clone(), end), EndLink { structures, pipes });
            }
        }

        // Pipes meeting at the same structure are neighbours even when their
        // ends are up to 2*eps apart.
        for members in by_structure.values() {
            let members: Vec<&EntityId> = members.iter().collect();
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    pairs.insert(ordered(a, b));
                }
            }
        }

        Self { ends, pairs }
    }

    pub fn end(&self, pipe: &EntityId, end: PipeEnd) -> Option<&EndLink> {
        self.ends.get(&(pipe.clone(), end))
    }

    /// Pipe pairs sharing a connected endpoint, in key order.
    pub fn pairs(&self) -> impl Iterator<Item = &(EntityId, EntityId)> {
        self.pairs.iter()
    }

    pub fn unconnected_ends(&self) -> impl Iterator<Item = (&EntityId, PipeEnd)> {
        self.ends
            .iter()
            .filter(|(_, link)| !link.is_connected())
            .map(|((id, end), _)| (id, *end))
    }
}

fn ordered(a: &EntityId, b: &EntityId) -> (EntityId, EntityId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// One `UnconnectedEnd` per pipe end with nothing within epsilon.
///
/// Deviation is the distance from the end to the structure the pipe declares there.
pub fn check(graph: &NetworkGraph, index: &ConnectivityIndex, at: DateTime<Utc>) -> Vec<Finding> {
    index
        .unconnected_ends()
        .filter_map(|(pipe_id, end)| {
            let pipe = graph.pipe(pipe_id)?;
            let declared = graph.structure_at(pipe, end)?;
            let gap = distance(pipe.endpoint(end), &declared.position);
            let key = FindingKey::new(FindingKind::UnconnectedEnd, [pipe_id.clone()])
                .with_qualifier(end.to_string());
            Some(Finding::new(key, gap, at).with_message(format!(
                "pipe {} {} is {:.4} from structure {} and touches nothing else",
                pipe_id, end, gap, declared.id
            )))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::point;
    use nr_graph::{GraphBuilder, Pipe, Structure};

    #[test]
    fn pipes_sharing_structure_pair_up() {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
        let s2 = Structure::new("S2", point(10.0, 0.0, -1.0));
        let s3 = Structure::new("S3", point(20.0, 0.0, -2.0));
        // Ends sit 0.008 either side of S2: 0.016 apart, each within eps of S2.
        let p1 = Pipe::between("P1", &s1, &s2).with_end_position(point(9.992, 0.0, -1.0));
        let p2 = Pipe::between("P2", &s2, &s3).with_start_position(point(10.008, 0.0, -1.0));
        let mut b = GraphBuilder::new();
        b.add_structure(s1).add_structure(s2).add_structure(s3);
        b.add_pipe(p1).add_pipe(p2);
        let g = b.build().unwrap();

        let index = ConnectivityIndex::build(&g, 0.01);
        let pairs: Vec<_> = index.pairs().cloned().collect();
        assert_eq!(pairs, vec![("P1".into(), "P2".into())]);
        assert_eq!(index.unconnected_ends().count(), 0);
    }

    #[test]
    fn pipe_to_pipe_without_structure_counts() {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
        let s2 = Structure::new("S2", point(10.0, 0.0, 0.0));
        let s3 = Structure::new("S3", point(20.0, 0.0, 0.0));
        // Both pipes stop short of S2 but meet each other mid-air.
        let p1 = Pipe::between("P1", &s1, &s2).with_end_position(point(9.0, 0.0, 0.0));
        let p2 = Pipe::between("P2", &s2, &s3).with_start_position(point(9.0, 0.0, 0.0));
        let mut b = GraphBuilder::new();
        b.add_structure(s1).add_structure(s2).add_structure(s3);
        b.add_pipe(p1).add_pipe(p2);
        let g = b.build().unwrap();

        let index = ConnectivityIndex::build(&g, 0.01);
        assert!(index.end(&"P1".into(), PipeEnd::End).unwrap().is_connected());
        assert_eq!(index.pairs().count(), 1);
        assert!(check(&g, &index, Utc::now()).is_empty());
    }
}

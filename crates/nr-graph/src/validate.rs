//! Snapshot validation logic.
//!
//! These checks guard the referential integrity of a snapshot. They are
//! fatal: a pipe pointing at a structure the collaborator did not return
//! means the collaborator's own data is inconsistent.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use nr_core::{EntityId, EntityKind, ensure_finite, ensure_finite_point};

use crate::entity::{Pipe, PipeEnd, Structure};
use crate::error::{GraphError, GraphResult};

/// Validate the snapshot tables: unique ids, finite numbers, resolvable references.
pub(crate) fn validate_structure(structures: &[Structure], pipes: &[Pipe]) -> GraphResult<()> {
    let mut structure_ids: HashSet<&EntityId> = HashSet::with_capacity(structures.len());
    for s in structures {
        if !structure_ids.insert(&s.id) {
            return Err(GraphError::DuplicateId {
                kind: EntityKind::Structure,
                id: s.id.clone(),
            });
        }
        ensure_finite_point(&s.position, "position").map_err(|_| GraphError::NonFinite {
            id: s.id.clone(),
            what: "position",
        })?;
    }

    // Ids are shared across both tables: downstream stores key by id alone.
    let mut pipe_ids: HashSet<&EntityId> = HashSet::with_capacity(pipes.len());
    for p in pipes {
        if structure_ids.contains(&p.id) || !pipe_ids.insert(&p.id) {
            return Err(GraphError::DuplicateId {
                kind: EntityKind::Pipe,
                id: p.id.clone(),
            });
        }
        validate_pipe_numbers(p)?;

        for end in PipeEnd::BOTH {
            let target = p.structure_at(end);
            if !structure_ids.contains(target) {
                return Err(GraphError::IncompleteEntity {
                    pipe: p.id.clone(),
                    structure: target.clone(),
                    end,
                });
            }
        }
    }

    Ok(())
}

fn validate_pipe_numbers(p: &Pipe) -> GraphResult<()> {
    let non_finite = |what: &'static str| GraphError::NonFinite {
        id: p.id.clone(),
        what,
    };
    ensure_finite_point(&p.start, "start").map_err(|_| non_finite("start"))?;
    ensure_finite_point(&p.end, "end").map_err(|_| non_finite("end"))?;
    ensure_finite(p.slope, "slope").map_err(|_| non_finite("slope"))?;
    ensure_finite(p.length, "length").map_err(|_| non_finite("length"))?;
    ensure_finite(p.size, "size").map_err(|_| non_finite("size"))?;
    Ok(())
}

/// Validate the adjacency index against the pipe table.
pub(crate) fn validate_adjacency(
    pipes: &BTreeMap<EntityId, Pipe>,
    adjacency: &BTreeMap<EntityId, BTreeSet<EntityId>>,
) -> GraphResult<()> {
    for (structure, incident) in adjacency {
        for pipe_id in incident {
            let touches = pipes.get(pipe_id).is_some_and(|p| {
                &p.start_structure == structure || &p.end_structure == structure
            });
            if !touches {
                return Err(GraphError::InconsistentAdjacency {
                    pipe: pipe_id.clone(),
                    structure: structure.clone(),
                });
            }
        }
    }

    // Every pipe must be listed under both of its structures
    for pipe in pipes.values() {
        for end in PipeEnd::BOTH {
            let structure = pipe.structure_at(end);
            let listed = adjacency
                .get(structure)
                .is_some_and(|set| set.contains(&pipe.id));
            if !listed {
                return Err(GraphError::InconsistentAdjacency {
                    pipe: pipe.id.clone(),
                    structure: structure.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::point;

    #[test]
    fn validate_empty_snapshot() {
        assert!(validate_structure(&[], &[]).is_ok());
    }

    #[test]
    fn validate_missing_structure_ref() {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
        let ghost = Structure::new("S9", point(5.0, 0.0, 0.0));
        let p = Pipe::between("P1", &s1, &ghost);

        let result = validate_structure(&[s1], &[p]);
        assert_eq!(
            result.unwrap_err(),
            GraphError::IncompleteEntity {
                pipe: "P1".into(),
                structure: "S9".into(),
                end: PipeEnd::End,
            }
        );
    }

    #[test]
    fn validate_duplicate_structure() {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
        let result = validate_structure(&[s1.clone(), s1], &[]);
        assert!(matches!(result, Err(GraphError::DuplicateId { .. })));
    }

    #[test]
    fn validate_id_shared_by_structure_and_pipe() {
        let s1 = Structure::new("X", point(0.0, 0.0, 0.0));
        let s2 = Structure::new("S2", point(1.0, 0.0, 0.0));
        let p = Pipe::between("X", &s1, &s2);
        let result = validate_structure(&[s1, s2], &[p]);
        assert_eq!(
            result.unwrap_err(),
            GraphError::DuplicateId {
                kind: EntityKind::Pipe,
                id: "X".into(),
            }
        );
    }

    #[test]
    fn validate_nan_slope() {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
        let s2 = Structure::new("S2", point(1.0, 0.0, 0.0));
        let p = Pipe::between("P1", &s1, &s2).with_slope(f64::NAN);
        let result = validate_structure(&[s1, s2], &[p]);
        assert!(matches!(
            result,
            Err(GraphError::NonFinite { what: "slope", .. })
        ));
    }

    #[test]
    fn validate_adjacency_detects_stray_pipe() {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
        let s2 = Structure::new("S2", point(1.0, 0.0, 0.0));
        let p = Pipe::between("P1", &s1, &s2);
        let pipes = BTreeMap::from([(p.id.clone(), p)]);
        let adjacency = BTreeMap::from([(
            EntityId::from("S1"),
            BTreeSet::from([EntityId::from("P1")]),
        )]);
        assert!(matches!(
            validate_adjacency(&pipes, &adjacency),
            Err(GraphError::InconsistentAdjacency { .. })
        ));
    }
}

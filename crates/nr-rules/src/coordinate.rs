//! Coordinate mismatch against externally supplied reference points.

use std::collections::{BTreeMap, BTreeSet};
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};
use nr_core::{EntityId, Point3, axis_deviations};
use nr_graph::NetworkGraph;
use tracing::{debug, warn};

use crate::config::RuleConfig;
use crate::finding::{Finding, FindingKey, FindingKind};
use crate::reference::{ReferencePoint, ReferencePoints};

/// Entities (and the position to compare) matching one reference label.
fn targets<'g>(graph: &'g NetworkGraph, r: &ReferencePoint) -> Vec<(&'g EntityId, &'g Point3)> {
    match r.end {
        None => graph
            .structures()
            .filter(|s| s.label_or_id() == r.label)
            .map(|s| (&s.id, &s.position))
            .collect(),
        Some(end) => graph
            .pipes()
            .filter(|p| p.label_or_id() == r.label)
            .map(|p| (&p.id, p.endpoint(end)))
            .collect(),
    }
}

/// One `CoordinateMismatch` per entity and axis whose deviation exceeds
/// that axis's tolerance. Returns the findings and the number of
/// reference points that matched no entity.
///
/// A label given more than once yields one finding per key, carrying the
/// largest deviation.
pub fn check(
    graph: &NetworkGraph,
    references: &ReferencePoints,
    rules: &RuleConfig,
    at: DateTime<Utc>,
) -> (Vec<Finding>, usize) {
    let mut findings: BTreeMap<FindingKey, Finding> = BTreeMap::new();
    let mut seen = BTreeSet::new();
    let mut unmatched = 0;

    for r in references.iter() {
        if !seen.insert((r.label.as_str(), r.end)) {
            warn!(label = %r.label, "reference label given more than once");
        }
        let hits = targets(graph, r);
        if hits.is_empty() {
            debug!(label = %r.label, "reference point matches no entity");
            unmatched += 1;
            continue;
        }
        for (id, actual) in hits {
            for (axis, dev) in axis_deviations(actual, &r.position) {
                if dev <= rules.axis_tolerance.get(axis) {
                    continue;
                }
                let mut qualifier = axis.to_string();
                if let Some(end) = r.end {
                    qualifier = format!("{end}.{axis}");
                }
                let key = FindingKey::new(FindingKind::CoordinateMismatch, [id.clone()])
                    .with_qualifier(qualifier);
                let finding = Finding::new(key.clone(), dev, at)
                    .with_axis(axis)
                    .with_message(format!(
                        "{} '{}' deviates {:.4} on {} from its reference",
                        id, r.label, dev, axis
                    ));
                match findings.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(finding);
                    }
                    Entry::Occupied(mut slot) if slot.get().deviation < dev => {
                        slot.insert(finding);
                    }
                    Entry::Occupied(_) => {}
                }
            }
        }
    }

    (findings.into_values().collect(), unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::{Axis, AxisTolerance, point};
    use nr_graph::{GraphBuilder, Pipe, PipeEnd, Structure};

    fn graph() -> NetworkGraph {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0)).with_label("MH-1");
        let s2 = Structure::new("S2", point(10.0, 0.0, -2.0));
        let p1 = Pipe::between("P1", &s1, &s2).with_label("L-1");
        let mut b = GraphBuilder::new();
        b.add_structure(s1).add_structure(s2).add_pipe(p1);
        b.build().unwrap()
    }

    #[test]
    fn flags_only_axes_beyond_tolerance() {
        let rules = RuleConfig {
            axis_tolerance: AxisTolerance {
                x: 0.05,
                y: 0.05,
                z: 0.5,
            },
            ..RuleConfig::default()
        };
        let refs = ReferencePoints::new(vec![ReferencePoint::structure(
            "MH-1",
            point(0.1, 0.01, 0.3),
        )]);
        let (findings, unmatched) = check(&graph(), &refs, &rules, Utc::now());
        assert_eq!(unmatched, 0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].axis, Some(Axis::X));
        assert!((findings[0].deviation - 0.1).abs() < 1e-12);
    }

    #[test]
    fn repeated_label_yields_one_finding_per_key() {
        let rules = RuleConfig::default();
        let refs = ReferencePoints::new(vec![
            ReferencePoint::structure("MH-1", point(0.0, 0.0, 0.3)),
            ReferencePoint::structure("MH-1", point(0.0, 0.0, 0.6)),
        ]);
        let (findings, unmatched) = check(&graph(), &refs, &rules, Utc::now());
        assert_eq!(unmatched, 0);
        assert_eq!(findings.len(), 1);
        assert!((findings[0].deviation - 0.6).abs() < 1e-12);
    }

    #[test]
    fn pipe_end_reference_and_id_fallback() {
        let rules = RuleConfig::default();
        let refs = ReferencePoints::new(vec![
            ReferencePoint::pipe_end("L-1", PipeEnd::End, point(10.0, 0.0, -2.5)),
            ReferencePoint::structure("S2", point(10.0, 0.0, -2.0)),
            ReferencePoint::structure("nowhere", point(0.0, 0.0, 0.0)),
        ]);
        let (findings, unmatched) = check(&graph(), &refs, &rules, Utc::now());
        assert_eq!(unmatched, 1);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].key.qualifier.as_deref(), Some("end.z"));
        assert_eq!(findings[0].key.entities, vec![EntityId::from("P1")]);
    }
}

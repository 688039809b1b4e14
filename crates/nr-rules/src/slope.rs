//! Slope discontinuity and degenerate geometry checks.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use nr_core::{EntityId, Real};
use nr_graph::{NetworkGraph, Pipe};

use crate::config::RuleConfig;
use crate::connectivity::ConnectivityIndex;
use crate::finding::{Finding, FindingKey, FindingKind};

/// Pipes too short to carry a meaningful slope.
///
/// Either the declared length or the endpoint span below `min_pipe_length`
/// makes a pipe degenerate.
pub fn degenerate_pipes<'g>(graph: &'g NetworkGraph, rules: &RuleConfig) -> Vec<&'g Pipe> {
    graph
        .pipes()
        .filter(|p| p.length < rules.min_pipe_length || p.span() < rules.min_pipe_length)
        .collect()
}

/// `DegenerateGeometry` for each zero-length pipe.
pub fn check_degenerate(graph: &NetworkGraph, rules: &RuleConfig, at: DateTime<Utc>) -> Vec<Finding> {
    degenerate_pipes(graph, rules)
        .into_iter()
        .map(|p| {
            let key = FindingKey::new(FindingKind::DegenerateGeometry, [p.id.clone()]);
            Finding::new(key, p.span(), at).with_message(format!(
                "pipe {} has length {:.3e} and span {:.3e}; excluded from slope checks",
                p.id,
                p.length,
                p.span()
            ))
        })
        .collect()
}

/// True when the slope jump between two pipes must be reported.
///
/// Strictly greater: a jump exactly at the threshold is accepted.
#[inline]
pub fn exceeds_threshold(slope_a: Real, slope_b: Real, threshold: Real) -> bool {
    (slope_a - slope_b).abs() > threshold
}

/// `SlopeDiscontinuity` for each connected pipe pair whose slopes differ
/// by more than the threshold. Degenerate pipes are skipped.
pub fn check(
    graph: &NetworkGraph,
    index: &ConnectivityIndex,
    rules: &RuleConfig,
    at: DateTime<Utc>,
) -> Vec<Finding> {
    let degenerate: BTreeSet<&EntityId> = degenerate_pipes(graph, rules)
        .into_iter()
        .map(|p| &p.id)
        .collect();

    index
        .pairs()
        .filter(|(a, b)| !degenerate.contains(a) && !degenerate.contains(b))
        .filter_map(|(a, b)| {
            let pa = graph.pipe(a)?;
            let pb = graph.pipe(b)?;
            if !exceeds_threshold(pa.slope, pb.slope, rules.slope_threshold) {
                return None;
            }
            let jump = (pa.slope - pb.slope).abs();
            let key = FindingKey::new(FindingKind::SlopeDiscontinuity, [a.clone(), b.clone()]);
            Some(Finding::new(key, jump, at).with_message(format!(
                "slope jumps by {:.4} between {} ({:.4}) and {} ({:.4})",
                jump, a, pa.slope, b, pb.slope
            )))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        assert!(!exceeds_threshold(-0.25, -0.5, 0.25));
        assert!(exceeds_threshold(-0.25, -0.5, 0.2));
        assert!(!exceeds_threshold(0.1, 0.1, 0.0));
        assert!(exceeds_threshold(-0.02, -0.10, 0.05));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn flagged_iff_strictly_above(a in -1.0_f64..1.0, b in -1.0_f64..1.0, t in 0.0_f64..0.5) {
            prop_assert_eq!(exceeds_threshold(a, b, t), (a - b).abs() > t);
            prop_assert_eq!(exceeds_threshold(a, b, t), exceeds_threshold(b, a, t));
        }

        #[test]
        fn exact_threshold_never_flagged(a in -1.0_f64..1.0, b in -1.0_f64..1.0) {
            let t = (a - b).abs();
            prop_assert!(!exceeds_threshold(a, b, t));
        }
    }
}

//! Validation engine: runs every rule check over one snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use nr_graph::NetworkGraph;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RuleConfig;
use crate::connectivity::{self, ConnectivityIndex};
use crate::coordinate;
use crate::finding::{Finding, FindingKind};
use crate::reference::ReferencePoints;
use crate::slope;

/// Counts describing one validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub structures: usize,
    pub pipes: usize,
    pub networks: usize,
    pub findings_by_kind: BTreeMap<FindingKind, usize>,
    pub unmatched_references: usize,
}

impl ValidationSummary {
    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.findings_by_kind.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Sorted by key.
    pub findings: Vec<Finding>,
    pub summary: ValidationSummary,
}

/// Run all checks and return the findings, sorted by key.
pub fn validate(
    graph: &NetworkGraph,
    rules: &RuleConfig,
    references: &ReferencePoints,
) -> Vec<Finding> {
    validate_at(graph, rules, references, Utc::now()).findings
}

/// Run all checks, stamping new findings with `at`.
///
/// The connectivity index is built once; the checks then run in parallel
/// over the shared read-only graph and are merged in key order, so two
/// runs over an unchanged graph yield the same keys and magnitudes.
pub fn validate_at(
    graph: &NetworkGraph,
    rules: &RuleConfig,
    references: &ReferencePoints,
    at: DateTime<Utc>,
) -> ValidationReport {
    let index = ConnectivityIndex::build(graph, rules.spatial_tolerance);

    let ((unconnected, slopes), ((coords, unmatched), degenerate)) = rayon::join(
        || {
            rayon::join(
                || connectivity::check(graph, &index, at),
                || slope::check(graph, &index, rules, at),
            )
        },
        || {
            rayon::join(
                || coordinate::check(graph, references, rules, at),
                || slope::check_degenerate(graph, rules, at),
            )
        },
    );
    debug!(
        unconnected = unconnected.len(),
        slopes = slopes.len(),
        coordinates = coords.len(),
        degenerate = degenerate.len(),
        "checks joined"
    );

    let mut findings: Vec<Finding> = unconnected
        .into_iter()
        .chain(slopes)
        .chain(coords)
        .chain(degenerate)
        .collect();
    findings.sort_by(|a, b| a.key.cmp(&b.key));

    let mut findings_by_kind = BTreeMap::new();
    for f in &findings {
        *findings_by_kind.entry(f.kind()).or_insert(0) += 1;
    }

    let summary = ValidationSummary {
        structures: graph.structure_count(),
        pipes: graph.pipe_count(),
        networks: graph.network_count(),
        findings_by_kind,
        unmatched_references: unmatched,
    };
    info!(
        findings = findings.len(),
        networks = summary.networks,
        "validation complete"
    );

    ValidationReport { findings, summary }
}

//! The `validate` command.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use nr_graph::ModelCollaborator;
use nr_rules::{ReferencePoints, ValidationReport};
use nr_sync::CancelToken;
use tracing::info;

use crate::config::EngineConfig;
use crate::error::AppResult;

/// Load reference points, or an empty set when no file is given.
pub fn load_references(path: Option<&Path>) -> AppResult<ReferencePoints> {
    match path {
        Some(path) => Ok(ReferencePoints::load_json(path)?),
        None => Ok(ReferencePoints::default()),
    }
}

/// Snapshot the model and run every rule check. Read-only, and needs no
/// store.
pub fn validate(
    model: Arc<dyn ModelCollaborator>,
    config: &EngineConfig,
    references: &ReferencePoints,
) -> AppResult<ValidationReport> {
    let graph = config
        .retry
        .run_bounded("model snapshot", &CancelToken::new(), move || {
            nr_graph::load_snapshot(model.as_ref())
        })?;
    let report = nr_rules::validate_at(&graph, &config.rules, references, Utc::now());
    info!(
        findings = report.findings.len(),
        unmatched_references = report.summary.unmatched_references,
        "validation complete"
    );
    Ok(report)
}

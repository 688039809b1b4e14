//! Findings, conflicts and audit queries.

use std::path::Path;

use nr_core::EntityId;
use nr_rules::{Finding, FindingStatus};
use nr_store::{AuditRecord, FileStore, JsonlAuditLog, StoreCollaborator};
use nr_sync::Resolution;

use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::error::AppResult;

/// Open the store kept beside a model file, and its audit log.
pub fn open_store(model_path: &Path) -> AppResult<(FileStore, JsonlAuditLog)> {
    let store = FileStore::beside(model_path)?;
    let audit = store.audit_log()?;
    Ok((store, audit))
}

/// Stored findings in key order, optionally hiding resolved ones.
pub fn list_findings(
    store: &dyn StoreCollaborator,
    include_resolved: bool,
) -> AppResult<Vec<Finding>> {
    let mut findings: Vec<Finding> = store
        .load_findings()?
        .into_iter()
        .filter(|f| include_resolved || f.status != FindingStatus::Resolved)
        .collect();
    findings.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(findings)
}

pub fn acknowledge_finding(
    collaborators: &Collaborators,
    config: &EngineConfig,
    finding_id: &str,
) -> AppResult<Finding> {
    let coordinator = collaborators.coordinator(config);
    Ok(coordinator.acknowledge_finding(finding_id)?)
}

pub fn resolve_conflict(
    collaborators: &Collaborators,
    config: &EngineConfig,
    entity_id: &EntityId,
    resolution: Resolution,
) -> AppResult<()> {
    let coordinator = collaborators.coordinator(config);
    coordinator.resolve_conflict(entity_id, resolution)?;
    Ok(())
}

/// Audit records, oldest first.
pub fn read_audit(log: &JsonlAuditLog) -> AppResult<Vec<AuditRecord>> {
    Ok(log.read_all()?)
}

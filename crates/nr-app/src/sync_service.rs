//! The `sync` command: load, validate, reconcile.

use std::time::Instant;

use chrono::Utc;
use nr_core::EntityId;
use nr_rules::ReferencePoints;
use nr_sync::{CancelToken, EntityFailure, SyncMode, SyncReport, SyncStage, WritebackReviewer};
use tracing::warn;

use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::error::AppResult;
use crate::progress::{CycleProgressEvent, CycleStage};

/// Request to run one sync cycle.
pub struct SyncRequest<'a> {
    pub mode: SyncMode,
    /// Decides which store -> model changes are applied.
    pub reviewer: &'a dyn WritebackReviewer,
    pub references: &'a ReferencePoints,
    pub config: &'a EngineConfig,
    pub cancel: Option<CancelToken>,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(CycleProgressEvent)>,
    mode: SyncMode,
    stage: CycleStage,
    started: Instant,
    message: Option<String>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(CycleProgressEvent::stage(
            mode,
            stage,
            started.elapsed().as_secs_f64(),
            message,
        ));
    }
}

/// Run a sync cycle.
pub fn sync(collaborators: &Collaborators, request: &SyncRequest) -> AppResult<SyncReport> {
    sync_with_progress(collaborators, request, None)
}

/// Run a sync cycle and stream stage events.
///
/// Findings are merged into the store only in apply mode. A store failure
/// while persisting findings is recorded in the report; an audit failure or
/// an unreadable snapshot aborts the cycle. In apply mode each write step
/// holds the store's writer claim, so a second process fails fast instead of
/// interleaving with this one.
pub fn sync_with_progress(
    collaborators: &Collaborators,
    request: &SyncRequest,
    mut progress_cb: Option<&mut dyn FnMut(CycleProgressEvent)>,
) -> AppResult<SyncReport> {
    let started = Instant::now();
    let mode = request.mode;

    let mut coordinator = collaborators.coordinator(request.config);
    if let Some(cancel) = &request.cancel {
        coordinator = coordinator.with_cancel(cancel.clone());
    }

    emit_progress(
        &mut progress_cb,
        mode,
        CycleStage::Loading,
        started,
        Some("Loading model snapshot".to_string()),
    );
    let graph = coordinator.load_snapshot()?;

    emit_progress(
        &mut progress_cb,
        mode,
        CycleStage::Validating,
        started,
        Some(format!(
            "Validating {} structures, {} pipes",
            graph.structure_count(),
            graph.pipe_count()
        )),
    );
    coordinator.cancel_token().check()?;
    let validation = nr_rules::validate_at(
        &graph,
        &request.config.rules,
        request.references,
        Utc::now(),
    );
    let ledger = match coordinator.reconcile_findings(&validation.findings, mode == SyncMode::Apply)
    {
        Ok(delta) => Ok(delta),
        Err(e) if !e.is_fatal() => {
            warn!(error = %e, "findings not persisted");
            Err(e)
        }
        Err(e) => return Err(e.into()),
    };

    let mut report = coordinator.sync(&graph, mode, request.reviewer, &mut |stage: SyncStage| {
        emit_progress(&mut progress_cb, mode, stage.into(), started, None)
    })?;
    report.findings_by_kind = validation.summary.findings_by_kind;
    match ledger {
        Ok(delta) => report.ledger = delta,
        Err(error) => report.failures.push(EntityFailure {
            id: EntityId::new("findings"),
            error,
        }),
    }

    emit_progress(
        &mut progress_cb,
        mode,
        CycleStage::Completed,
        started,
        Some(format!(
            "{} synced, {} failed, {} conflicted",
            report.synced_count(),
            report.failed_count(),
            report.conflicted_count()
        )),
    );
    Ok(report)
}

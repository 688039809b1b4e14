//! The reconciliation cycle.

use std::sync::Arc;

use nr_core::{CollabResult, EntityId, Revision};
use nr_graph::{Entity, ModelCollaborator, NetworkGraph};
use nr_rules::Finding;
use nr_store::{
    AuditOperation, AuditOutcome, AuditRecord, AuditSink, PendingDirection, StoreCollaborator,
    SyncRecord, WriterClaim,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::error::{Side, SyncError, SyncResult};
use crate::gate::{Review, WritebackProposal, WritebackReviewer, propose_writeback};
use crate::ledger::{LedgerDelta, acknowledge, merge_findings};
use crate::locks::EntityLocks;
use crate::plan::{EntityPlan, SyncPlan};
use crate::report::{BatchOutcome, ConflictEntry, EntityFailure, SyncReport};
use crate::retry::RetryConfig;
use crate::state::SyncState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Classify and report; write nothing anywhere.
    DryRun,
    Apply,
}

/// Stages reported while a cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Planning,
    PushingToStore,
    ReviewingWriteback,
    WritingBack,
    Auditing,
}

/// Manual choice for a conflicted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeepModel,
    KeepStore,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub retry: RetryConfig,
    /// Classify entities on the rayon pool.
    pub parallel: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            parallel: true,
        }
    }
}

/// Drives one reconciliation cycle between a model and a store.
///
/// Holds no state beyond the cycle: collaborators are passed in, and the
/// lock registry must be shared (see [`with_locks`](Self::with_locks)) with
/// every other coordinator running against the same collaborators. Every
/// write goes through a write-ahead audit record; an audit failure aborts
/// the cycle.
///
/// Reads are held to the configured call deadline. Writes are single
/// per-entity calls and are never abandoned halfway.
pub struct SyncCoordinator {
    model: Arc<dyn ModelCollaborator>,
    store: Arc<dyn StoreCollaborator>,
    audit: Arc<dyn AuditSink>,
    options: SyncOptions,
    locks: Arc<EntityLocks>,
    cancel: CancelToken,
    cycle_id: Uuid,
}

impl SyncCoordinator {
    pub fn new(
        model: Arc<dyn ModelCollaborator>,
        store: Arc<dyn StoreCollaborator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            model,
            store,
            audit,
            options: SyncOptions::default(),
            locks: EntityLocks::new(),
            cancel: CancelToken::new(),
            cycle_id: Uuid::new_v4(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_locks(mut self, locks: Arc<EntityLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cycle_id(&self) -> Uuid {
        self.cycle_id
    }

    pub fn locks(&self) -> &Arc<EntityLocks> {
        &self.locks
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    // ---- collaborator calls -------------------------------------------------

    fn read_store<T, F>(&self, what: &str, op: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: Fn(&dyn StoreCollaborator) -> CollabResult<T> + Send + Sync + 'static,
    {
        let store = Arc::clone(&self.store);
        self.options
            .retry
            .run_bounded(what, &self.cancel, move || op(store.as_ref()))
            .map_err(SyncError::SourceUnavailable)
    }

    fn read_model<T, F>(&self, what: &str, op: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: Fn(&dyn ModelCollaborator) -> CollabResult<T> + Send + Sync + 'static,
    {
        let model = Arc::clone(&self.model);
        self.options
            .retry
            .run_bounded(what, &self.cancel, move || op(model.as_ref()))
            .map_err(SyncError::SourceUnavailable)
    }

    fn write<T>(
        &self,
        id: &EntityId,
        side: Side,
        op: impl FnMut() -> CollabResult<T>,
    ) -> SyncResult<T> {
        let what = match side {
            Side::Model => "model write",
            Side::Store => "store write",
        };
        self.options
            .retry
            .run(what, &self.cancel, op)
            .map_err(|source| SyncError::WritebackFailure {
                id: id.clone(),
                side,
                source,
            })
    }

    fn append(&self, record: &AuditRecord) -> SyncResult<()> {
        self.options
            .retry
            .run("audit log", &self.cancel, || self.audit.append(record))
            .map_err(SyncError::AuditUnavailable)
    }

    /// Exclusive write access to the store for one operation.
    pub fn claim_writer(&self) -> SyncResult<WriterClaim> {
        self.options
            .retry
            .run("writer claim", &self.cancel, || self.store.claim_writer())
            .map_err(SyncError::SourceUnavailable)
    }

    /// Whether both sides and the sync record still hold the revisions
    /// `entry` was planned from. Call with the entity lock held.
    fn still_as_planned(&self, entry: &EntityPlan) -> SyncResult<bool> {
        let key = entry.id.clone();
        let model_now = self.read_model("model revision", move |m| m.revision_of(&key))?;
        let key = entry.id.clone();
        let (store_now, record_now) = self.read_store("store entity", move |s| {
            let stored = s.load_entity(&key)?.map(|e| e.revision());
            let record = s
                .load_sync_state()?
                .into_iter()
                .find(|r| r.entity_id == key)
                .map(|r| stamps(&r));
            Ok((stored, record))
        })?;
        let unchanged = model_now == entry.model.as_ref().map(Entity::revision)
            && store_now == entry.store.as_ref().map(Entity::revision)
            && record_now == entry.record.as_ref().map(stamps);
        if !unchanged {
            debug!(entity = %entry.id, ?model_now, ?store_now, "entity moved after planning");
        }
        Ok(unchanged)
    }

    fn ensure_unchanged(&self, entry: &EntityPlan) -> SyncResult<()> {
        if self.still_as_planned(entry)? {
            Ok(())
        } else {
            warn!(entity = %entry.id, "entity moved after planning; not written");
            Err(SyncError::WriteConflict {
                id: entry.id.clone(),
            })
        }
    }

    fn started(&self, operation: AuditOperation) -> AuditRecord {
        AuditRecord::new(self.cycle_id, operation, AuditOutcome::Started)
    }

    /// Write-ahead audit around one write.
    ///
    /// The outer error is fatal (audit unavailable); the inner one belongs to
    /// the entity being written.
    fn audited<T>(
        &self,
        record: AuditRecord,
        write: impl FnOnce() -> SyncResult<T>,
    ) -> SyncResult<SyncResult<T>> {
        self.append(&record)?;
        let result = write();
        let outcome = match &result {
            Ok(_) => AuditOutcome::Succeeded,
            Err(e) => AuditOutcome::Failed {
                error: e.to_string(),
            },
        };
        self.append(&AuditRecord {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            outcome,
            ..record
        })?;
        Ok(result)
    }

    // ---- read phase ---------------------------------------------------------

    /// Load the model snapshot, retrying transient outages.
    pub fn load_snapshot(&self) -> SyncResult<NetworkGraph> {
        self.cancel.check()?;
        let model = Arc::clone(&self.model);
        let graph = self
            .options
            .retry
            .run_bounded("model snapshot", &self.cancel, move || {
                nr_graph::load_snapshot(model.as_ref())
            })?;
        Ok(graph)
    }

    /// Classify every entity known to the snapshot or the store.
    pub fn plan(&self, graph: &NetworkGraph) -> SyncResult<SyncPlan> {
        self.cancel.check()?;
        let stored = self.read_store("store entities", |s| s.load_entities())?;
        let records = self.read_store("sync state", |s| s.load_sync_state())?;
        let plan = SyncPlan::build(graph.entities(), stored, records, self.options.parallel);
        info!(
            entities = plan.len(),
            in_sync = plan.count(SyncState::InSync),
            to_store = plan.count(SyncState::ToStore),
            to_model = plan.count(SyncState::ToModel),
            conflicts = plan.count(SyncState::Conflict),
            orphaned = plan.count(SyncState::Orphaned),
            "sync plan"
        );
        Ok(plan)
    }

    // ---- findings -----------------------------------------------------------

    /// Merge a validation run into the stored findings; persist when asked.
    pub fn reconcile_findings(&self, fresh: &[Finding], persist: bool) -> SyncResult<LedgerDelta> {
        let _claim = if persist {
            Some(self.claim_writer()?)
        } else {
            None
        };
        let stored = self.read_store("findings", |s| s.load_findings())?;
        let delta = merge_findings(&stored, fresh);
        debug!(
            opened = delta.opened,
            reopened = delta.reopened,
            resolved = delta.resolved,
            unchanged = delta.unchanged,
            "findings merged"
        );
        if !persist || delta.upserts.is_empty() {
            return Ok(delta);
        }

        let mut entities: Vec<EntityId> = delta
            .upserts
            .iter()
            .flat_map(|f| f.key.entities.iter().cloned())
            .collect();
        entities.sort();
        entities.dedup();
        let ids: Vec<&str> = delta.upserts.iter().map(|f| f.id.as_str()).collect();
        let record = self
            .started(AuditOperation::PersistFindings)
            .entities(entities)
            .after(&ids);
        let table = EntityId::new("findings");
        self.audited(record, || {
            self.write(&table, Side::Store, || {
                self.store.upsert_findings(&delta.upserts)
            })
        })??;
        Ok(delta)
    }

    /// Move one stored finding to Acknowledged.
    pub fn acknowledge_finding(&self, id: &str) -> SyncResult<Finding> {
        let _claim = self.claim_writer()?;
        let stored = self.read_store("findings", |s| s.load_findings())?;
        let finding = stored
            .into_iter()
            .find(|f| f.id == id)
            .ok_or_else(|| SyncError::FindingNotFound(id.to_string()))?;
        let acked = acknowledge(&finding)?;
        if acked == finding {
            return Ok(acked);
        }

        let record = self
            .started(AuditOperation::AcknowledgeFinding)
            .entities(finding.key.entities.clone())
            .before(&finding.status)
            .after(&acked.status);
        let target = EntityId::new(id);
        self.audited(record, || {
            self.write(&target, Side::Store, || {
                self.store.upsert_findings(std::slice::from_ref(&acked))
            })
        })??;
        info!(finding = id, "finding acknowledged");
        Ok(acked)
    }

    // ---- write phase --------------------------------------------------------

    /// Push model values to the store for each entry.
    ///
    /// The store copy takes the model's revision, or one past the store's
    /// own if that is higher, so store stamps never go backwards. The write
    /// only lands while the store still holds the copy the plan saw; a
    /// correction that arrived since fails the entity with `WriteConflict`.
    pub fn push_to_store(&self, entries: &[&EntityPlan]) -> SyncResult<BatchOutcome> {
        let mut batch = BatchOutcome::default();
        for entry in entries {
            let id = &entry.id;
            let Some(model) = &entry.model else {
                batch.fail(id.clone(), SyncError::EntityNotFound(id.clone()));
                continue;
            };
            if let Err(e) = self.cancel.check() {
                batch.fail(id.clone(), e);
                continue;
            }
            let _guard = match self.locks.try_acquire(id) {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(entity = %id, "push skipped: in flight");
                    batch.fail(id.clone(), e);
                    continue;
                }
            };

            let store_rev = entry.store.as_ref().map_or(model.revision(), |s| {
                model.revision().max(s.revision().next())
            });
            let stored = model.clone().with_revision(store_rev);
            let mut record = self
                .started(AuditOperation::PushToStore)
                .entity(id.clone())
                .after(&stored);
            if let Some(before) = &entry.store {
                record = record.before(before);
            }

            let expected = entry.store.as_ref().map(Entity::revision);
            let result = self.audited(record, || {
                let replaced = self.write(id, Side::Store, || {
                    self.store.replace_entity(&stored, expected)
                })?;
                if !replaced {
                    return Err(SyncError::WriteConflict { id: id.clone() });
                }
                let sync = SyncRecord::in_sync(model, model.revision(), store_rev);
                self.write(id, Side::Store, || {
                    self.store.upsert_sync_records(std::slice::from_ref(&sync))
                })
            })?;
            match result {
                Ok(()) => {
                    debug!(entity = %id, revision = %store_rev, "pushed to store");
                    batch.succeed(id.clone());
                }
                Err(e) => {
                    warn!(entity = %id, error = %e, "push failed");
                    batch.fail(id.clone(), e);
                }
            }
        }
        Ok(batch)
    }

    /// Offer the store -> model changes to a reviewer.
    pub fn review_writeback(
        &self,
        entries: &[&EntityPlan],
        reviewer: &dyn WritebackReviewer,
    ) -> SyncResult<Review> {
        let proposals: Vec<WritebackProposal> = entries
            .iter()
            .filter_map(|e| {
                Some(WritebackProposal {
                    id: e.id.clone(),
                    current: e.model.clone()?,
                    proposed: e.store.clone()?,
                    base: e.record.as_ref().and_then(|r| r.base.clone()),
                })
            })
            .collect();
        if proposals.is_empty() {
            return Ok(Review::default());
        }
        let review = propose_writeback(reviewer, &proposals);
        let record = AuditRecord::new(
            self.cycle_id,
            AuditOperation::ProposeWriteback,
            AuditOutcome::Succeeded,
        )
        .entities(proposals.iter().map(|p| p.id.clone()))
        .after(&serde_json::json!({
            "accepted": review.accepted,
            "rejected": review.rejected,
        }));
        self.append(&record)?;
        info!(
            proposed = proposals.len(),
            accepted = review.accepted.len(),
            rejected = review.rejected.len(),
            "writeback reviewed"
        );
        Ok(review)
    }

    /// Write accepted store values into the model, one atomic call each.
    ///
    /// Both sides are re-read under the entity lock first; an entity that
    /// moved since planning fails with `WriteConflict` and is not written.
    pub fn apply_writeback(&self, entries: &[&EntityPlan]) -> SyncResult<BatchOutcome> {
        let mut batch = BatchOutcome::default();
        for entry in entries {
            let id = &entry.id;
            let (Some(current), Some(proposed)) = (&entry.model, &entry.store) else {
                batch.fail(id.clone(), SyncError::EntityNotFound(id.clone()));
                continue;
            };
            if let Err(e) = self.cancel.check() {
                batch.fail(id.clone(), e);
                continue;
            }
            let _guard = match self.locks.try_acquire(id) {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(entity = %id, "writeback skipped: in flight");
                    batch.fail(id.clone(), e);
                    continue;
                }
            };

            let record = self
                .started(AuditOperation::Writeback)
                .entity(id.clone())
                .before(current)
                .after(proposed);
            let result = self.audited(record, || {
                self.ensure_unchanged(entry)?;
                let model_rev =
                    self.write(id, Side::Model, || self.model.write_entity(id, proposed))?;
                let sync = SyncRecord::in_sync(proposed, model_rev, proposed.revision());
                self.write(id, Side::Store, || {
                    self.store.upsert_sync_records(std::slice::from_ref(&sync))
                })
            })?;
            match result {
                Ok(()) => {
                    debug!(entity = %id, "written back to model");
                    batch.succeed(id.clone());
                }
                Err(e) => {
                    warn!(entity = %id, error = %e, "writeback failed");
                    batch.fail(id.clone(), e);
                }
            }
        }
        Ok(batch)
    }

    /// Rewrite sync records for entities that are in sync but carry stale
    /// stamps. Entities in flight elsewhere or moved since planning are left
    /// for the next cycle.
    fn refresh_records(&self, entries: &[&EntityPlan]) -> SyncResult<BatchOutcome> {
        let mut batch = BatchOutcome::default();
        let mut guards = Vec::with_capacity(entries.len());
        let mut records = Vec::with_capacity(entries.len());
        for e in entries {
            let (Some(m), Some(s)) = (&e.model, &e.store) else {
                continue;
            };
            let Ok(guard) = self.locks.try_acquire(&e.id) else {
                debug!(entity = %e.id, "refresh skipped: in flight");
                continue;
            };
            if !self.still_as_planned(e)? {
                continue;
            }
            guards.push(guard);
            records.push(SyncRecord::in_sync(m, m.revision(), s.revision()));
        }
        if records.is_empty() {
            return Ok(batch);
        }
        let ids: Vec<EntityId> = records.iter().map(|r| r.entity_id.clone()).collect();
        let record = self
            .started(AuditOperation::RefreshSyncState)
            .entities(ids.clone());
        let table = EntityId::new("sync_state");
        match self.audited(record, || {
            self.write(&table, Side::Store, || self.store.upsert_sync_records(&records))
        })? {
            Ok(()) => ids.into_iter().for_each(|id| batch.succeed(id)),
            Err(e) => ids.into_iter().for_each(|id| batch.fail(id, e.clone())),
        }
        Ok(batch)
    }

    /// Flag entries in the sync-state table without touching their stamps.
    ///
    /// Same locking as `refresh_records`: a record that moved since planning
    /// belongs to another cycle and is left alone.
    fn mark_pending(
        &self,
        entries: &[&EntityPlan],
        pending: PendingDirection,
    ) -> SyncResult<Vec<EntityFailure>> {
        let mut guards = Vec::with_capacity(entries.len());
        let mut records = Vec::with_capacity(entries.len());
        for e in entries {
            let record = match &e.record {
                Some(r) if r.pending == pending => continue,
                Some(r) => r.clone().with_pending(pending),
                None => {
                    let Some(m) = e.model.as_ref() else {
                        continue;
                    };
                    SyncRecord {
                        entity_id: e.id.clone(),
                        entity_kind: m.kind(),
                        last_model: Revision::ZERO,
                        last_store: Revision::ZERO,
                        pending,
                        base: None,
                        updated_at: chrono::Utc::now(),
                    }
                }
            };
            let Ok(guard) = self.locks.try_acquire(&e.id) else {
                debug!(entity = %e.id, "pending flag skipped: in flight");
                continue;
            };
            if !self.still_as_planned(e)? {
                continue;
            }
            guards.push(guard);
            records.push(record);
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let table = EntityId::new("sync_state");
        match self.write(&table, Side::Store, || self.store.upsert_sync_records(&records)) {
            Ok(()) => Ok(Vec::new()),
            Err(error) => {
                warn!(error = %error, "could not record pending state");
                Ok(records
                    .into_iter()
                    .map(|r| EntityFailure {
                        id: r.entity_id,
                        error: error.clone(),
                    })
                    .collect())
            }
        }
    }

    fn audit_conflicts(&self, entries: &[&EntityPlan]) -> SyncResult<Vec<ConflictEntry>> {
        let mut out = Vec::with_capacity(entries.len());
        for e in entries {
            let (Some(model), Some(store)) = (&e.model, &e.store) else {
                continue;
            };
            warn!(
                entity = %e.id,
                model = %model.revision(),
                store = %store.revision(),
                "conflict: both sides changed since last sync"
            );
            let record = AuditRecord::new(
                self.cycle_id,
                AuditOperation::Conflict,
                AuditOutcome::Skipped {
                    reason: SyncError::WriteConflict { id: e.id.clone() }.to_string(),
                },
            )
            .entity(e.id.clone())
            .before(model)
            .after(store);
            self.append(&record)?;
            out.push(conflict_entry(e, model, store));
        }
        Ok(out)
    }

    /// Run one reconciliation cycle over a loaded snapshot.
    ///
    /// Conflicts are reported and never written. In dry-run mode nothing is
    /// written anywhere, the audit log included.
    pub fn sync(
        &self,
        graph: &NetworkGraph,
        mode: SyncMode,
        reviewer: &dyn WritebackReviewer,
        on_stage: &mut dyn FnMut(SyncStage),
    ) -> SyncResult<SyncReport> {
        let span = info_span!("sync_cycle", cycle_id = %self.cycle_id, ?mode);
        let _enter = span.enter();

        let _claim = match mode {
            SyncMode::Apply => Some(self.claim_writer()?),
            SyncMode::DryRun => None,
        };
        on_stage(SyncStage::Planning);
        let plan = self.plan(graph)?;
        let ids = |state: SyncState| -> Vec<EntityId> {
            plan.with_state(state).map(|e| e.id.clone()).collect()
        };
        let mut report = SyncReport::new(self.cycle_id, mode == SyncMode::DryRun);
        report.in_sync = ids(SyncState::InSync);
        report.orphaned = ids(SyncState::Orphaned);
        for id in &report.orphaned {
            warn!(entity = %id, "store entity has no model counterpart; left untouched");
        }

        let to_store: Vec<&EntityPlan> = plan.with_state(SyncState::ToStore).collect();
        let to_model: Vec<&EntityPlan> = plan.with_state(SyncState::ToModel).collect();
        let conflicts: Vec<&EntityPlan> = plan.with_state(SyncState::Conflict).collect();

        if mode == SyncMode::DryRun {
            report.pending_push = ids(SyncState::ToStore);
            report.pending_writeback = ids(SyncState::ToModel);
            report.conflicts = conflicts
                .iter()
                .filter_map(|e| Some(conflict_entry(e, e.model.as_ref()?, e.store.as_ref()?)))
                .collect();
            info!(
                pending_push = report.pending_push.len(),
                pending_writeback = report.pending_writeback.len(),
                conflicts = report.conflicts.len(),
                "dry run complete"
            );
            return Ok(report);
        }

        let stale: Vec<&EntityPlan> = plan
            .entries()
            .iter()
            .filter(|e| e.needs_refresh())
            .collect();
        let refreshed = self.refresh_records(&stale)?;
        report.absorb(refreshed);

        on_stage(SyncStage::PushingToStore);
        let pushed = self.push_to_store(&to_store)?;
        report.pushed = report.absorb(pushed);

        report.conflicts = self.audit_conflicts(&conflicts)?;
        let failures = self.mark_pending(&conflicts, PendingDirection::Conflict)?;
        report.failures.extend(failures);

        on_stage(SyncStage::ReviewingWriteback);
        let review = self.review_writeback(&to_model, reviewer)?;
        let rejected: Vec<&EntityPlan> = to_model
            .iter()
            .copied()
            .filter(|e| review.rejected.contains(&e.id))
            .collect();
        let failures = self.mark_pending(&rejected, PendingDirection::ToModel)?;
        report.failures.extend(failures);
        report.pending_writeback = review.rejected;

        on_stage(SyncStage::WritingBack);
        let accepted: Vec<&EntityPlan> = to_model
            .iter()
            .copied()
            .filter(|e| review.accepted.contains(&e.id))
            .collect();
        let written = self.apply_writeback(&accepted)?;
        report.written_back = report.absorb(written);

        on_stage(SyncStage::Auditing);
        let failed: Vec<&EntityId> = report.failed().collect();
        let summary = AuditRecord::new(
            self.cycle_id,
            AuditOperation::CycleCompleted,
            if failed.is_empty() {
                AuditOutcome::Succeeded
            } else {
                AuditOutcome::Failed {
                    error: format!("{} entities failed", failed.len()),
                }
            },
        )
        .after(&serde_json::json!({
            "pushed": report.pushed,
            "written_back": report.written_back,
            "pending_writeback": report.pending_writeback,
            "conflicts": report.conflicts.iter().map(|c| &c.id).collect::<Vec<_>>(),
            "orphaned": report.orphaned,
            "failed": failed,
        }));
        self.append(&summary)?;

        info!(
            pushed = report.pushed.len(),
            written_back = report.written_back.len(),
            conflicts = report.conflicts.len(),
            failed = report.failed_count(),
            "sync cycle complete"
        );
        Ok(report)
    }

    /// Settle one conflicted entity by keeping one side's values.
    ///
    /// Re-reads both sides first; fails with `NotInConflict` when the entity
    /// no longer needs a decision.
    pub fn resolve_conflict(&self, id: &EntityId, resolution: Resolution) -> SyncResult<()> {
        let _claim = self.claim_writer()?;
        let graph = self.load_snapshot()?;
        let plan = self.plan(&graph)?;
        let entry = plan
            .get(id)
            .ok_or_else(|| SyncError::EntityNotFound(id.clone()))?;
        if entry.state != SyncState::Conflict {
            return Err(SyncError::NotInConflict {
                id: id.clone(),
                state: entry.state,
            });
        }
        let (Some(model), Some(store)) = (&entry.model, &entry.store) else {
            return Err(SyncError::EntityNotFound(id.clone()));
        };
        let _guard = self.locks.try_acquire(id)?;

        let kept = match resolution {
            Resolution::KeepModel => model,
            Resolution::KeepStore => store,
        };
        let record = self
            .started(AuditOperation::ResolveConflict)
            .entity(id.clone())
            .before(&serde_json::json!({ "model": model, "store": store }))
            .after(kept);
        self.audited(record, || match resolution {
            Resolution::KeepModel => {
                let store_rev = model.revision().max(store.revision().next());
                let stored = model.clone().with_revision(store_rev);
                let replaced = self.write(id, Side::Store, || {
                    self.store.replace_entity(&stored, Some(store.revision()))
                })?;
                if !replaced {
                    return Err(SyncError::WriteConflict { id: id.clone() });
                }
                let sync = SyncRecord::in_sync(model, model.revision(), store_rev);
                self.write(id, Side::Store, || {
                    self.store.upsert_sync_records(std::slice::from_ref(&sync))
                })
            }
            Resolution::KeepStore => {
                self.ensure_unchanged(entry)?;
                let model_rev = self.write(id, Side::Model, || self.model.write_entity(id, store))?;
                let sync = SyncRecord::in_sync(store, model_rev, store.revision());
                self.write(id, Side::Store, || {
                    self.store.upsert_sync_records(std::slice::from_ref(&sync))
                })
            }
        })??;
        info!(entity = %id, ?resolution, "conflict resolved");
        Ok(())
    }
}

fn stamps(record: &SyncRecord) -> (Revision, Revision, PendingDirection) {
    (record.last_model, record.last_store, record.pending)
}

fn conflict_entry(plan: &EntityPlan, model: &Entity, store: &Entity) -> ConflictEntry {
    ConflictEntry {
        id: plan.id.clone(),
        model_revision: model.revision(),
        store_revision: store.revision(),
        last_model: plan.record.as_ref().map(|r| r.last_model),
        last_store: plan.record.as_ref().map(|r| r.last_store),
    }
}

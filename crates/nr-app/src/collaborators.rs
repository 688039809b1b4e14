//! The collaborator set every command runs against.

use std::path::Path;
use std::sync::Arc;

use nr_graph::ModelCollaborator;
use nr_store::{AuditSink, StoreCollaborator};
use nr_sync::{EntityLocks, SyncCoordinator};

use crate::config::EngineConfig;
use crate::error::AppResult;
use crate::ledger_service::open_store;
use crate::model_file::FileModel;

/// Model, store and audit log, plus the one entity lock registry shared by
/// every coordinator built from them.
///
/// Clones share the registry, so concurrent commands in one process see
/// each other's in-flight entities. Other processes are kept out by the
/// store's writer claim.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn ModelCollaborator>,
    pub store: Arc<dyn StoreCollaborator>,
    pub audit: Arc<dyn AuditSink>,
    locks: Arc<EntityLocks>,
}

impl Collaborators {
    pub fn new(
        model: Arc<dyn ModelCollaborator>,
        store: Arc<dyn StoreCollaborator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            model,
            store,
            audit,
            locks: EntityLocks::new(),
        }
    }

    /// A model file and the store and audit log kept beside it.
    pub fn open(model_path: &Path) -> AppResult<Self> {
        let model = FileModel::open(model_path)?;
        let (store, audit) = open_store(model_path)?;
        Ok(Self::new(Arc::new(model), Arc::new(store), Arc::new(audit)))
    }

    pub fn locks(&self) -> &Arc<EntityLocks> {
        &self.locks
    }

    pub fn coordinator(&self, config: &EngineConfig) -> SyncCoordinator {
        SyncCoordinator::new(
            Arc::clone(&self.model),
            Arc::clone(&self.store),
            Arc::clone(&self.audit),
        )
        .with_options(config.sync_options())
        .with_locks(Arc::clone(&self.locks))
    }
}

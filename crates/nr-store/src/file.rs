//! Directory-backed store.
//!
//! Layout under the root directory:
//! - `entities.json`   entity table keyed by id
//! - `sync_state.json` sync records keyed by entity id
//! - `findings.json`   findings keyed by finding id
//! - `audit.jsonl`     append-only audit table
//! - `tables.lock`     held while one table is read, modified and rewritten
//! - `writer.lock`     held by the cycle currently writing, see `claim_writer`

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

use nr_core::{CollabError, CollabResult, EntityId, Revision};
use nr_graph::Entity;
use nr_rules::Finding;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::audit::JsonlAuditLog;
use crate::store::{StoreCollaborator, WriterClaim};
use crate::types::SyncRecord;
use crate::{StoreError, StoreResult};

const ENTITIES: &str = "entities.json";
const SYNC_STATE: &str = "sync_state.json";
const FINDINGS: &str = "findings.json";
const AUDIT: &str = "audit.jsonl";
const TABLES_LOCK: &str = "tables.lock";
const WRITER_LOCK: &str = "writer.lock";

/// Store kept as JSON tables in one directory.
///
/// Table rewrites are serialized within the process by a mutex and across
/// processes by an OS file lock, so two cycles never lose each other's rows.
#[derive(Debug)]
pub struct FileStore {
    root_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root_dir: PathBuf) -> StoreResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self {
            root_dir,
            lock: Mutex::new(()),
        })
    }

    /// Store kept next to a model file, under `.netrecon/store`.
    pub fn beside(model_path: &Path) -> StoreResult<Self> {
        let dir = model_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(dir.join(".netrecon").join("store"))
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn audit_log(&self) -> StoreResult<JsonlAuditLog> {
        JsonlAuditLog::new(self.root_dir.join(AUDIT))
    }

    /// Apply an externally authored correction: replace the stored fields
    /// and advance the store revision past the current one.
    pub fn record_correction(&self, entity: Entity) -> StoreResult<Revision> {
        let _guard = self.lock.lock();
        let _tables = self.lock_tables()?;
        let mut table: BTreeMap<EntityId, Entity> = self.read_table(ENTITIES)?;
        let current = table
            .get(entity.id())
            .ok_or_else(|| StoreError::EntityNotFound(entity.id().to_string()))?;
        let next = current.revision().max(entity.revision()).next();
        table.insert(entity.id().clone(), entity.with_revision(next));
        self.write_table(ENTITIES, &table)?;
        Ok(next)
    }

    fn lock_file(&self, name: &str) -> StoreResult<File> {
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root_dir.join(name))?)
    }

    /// Blocks until no other process is rewriting a table.
    fn lock_tables(&self) -> StoreResult<File> {
        let file = self.lock_file(TABLES_LOCK)?;
        file.lock()?;
        Ok(file)
    }

    fn read_table<T: DeserializeOwned + Default>(&self, name: &str) -> StoreResult<T> {
        let path = self.root_dir.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write to a temp file and rename over the table so readers never see
    /// a half-written file.
    fn write_table<T: Serialize>(&self, name: &str, value: &T) -> StoreResult<()> {
        let path = self.root_dir.join(name);
        let tmp = self
            .root_dir
            .join(format!("{name}.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn upsert<T, K, F>(&self, name: &str, rows: &[T], key: F) -> StoreResult<()>
    where
        T: Clone + Serialize + DeserializeOwned,
        K: Ord + Serialize + DeserializeOwned,
        F: Fn(&T) -> K,
    {
        let _guard = self.lock.lock();
        let _tables = self.lock_tables()?;
        let mut table: BTreeMap<K, T> = self.read_table(name)?;
        for row in rows {
            table.insert(key(row), row.clone());
        }
        self.write_table(name, &table)?;
        debug!(table = name, rows = rows.len(), "upserted");
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> StoreResult<Vec<T>> {
        let _guard = self.lock.lock();
        let table: BTreeMap<String, T> = self.read_table(name)?;
        Ok(table.into_values().collect())
    }
}

impl StoreCollaborator for FileStore {
    fn load_sync_state(&self) -> CollabResult<Vec<SyncRecord>> {
        Ok(self.load(SYNC_STATE)?)
    }

    fn upsert_sync_records(&self, records: &[SyncRecord]) -> CollabResult<()> {
        Ok(self.upsert(SYNC_STATE, records, |r| r.entity_id.clone())?)
    }

    fn load_findings(&self) -> CollabResult<Vec<Finding>> {
        Ok(self.load(FINDINGS)?)
    }

    fn upsert_findings(&self, findings: &[Finding]) -> CollabResult<()> {
        Ok(self.upsert(FINDINGS, findings, |f| f.id.clone())?)
    }

    fn load_entities(&self) -> CollabResult<Vec<Entity>> {
        Ok(self.load(ENTITIES)?)
    }

    fn upsert_entities(&self, entities: &[Entity]) -> CollabResult<()> {
        Ok(self.upsert(ENTITIES, entities, |e| e.id().clone())?)
    }

    fn replace_entity(&self, entity: &Entity, expected: Option<Revision>) -> CollabResult<bool> {
        let _guard = self.lock.lock();
        let _tables = self.lock_tables()?;
        let mut table: BTreeMap<EntityId, Entity> = self.read_table(ENTITIES)?;
        let current = table.get(entity.id()).map(Entity::revision);
        if current != expected {
            debug!(entity = %entity.id(), ?current, ?expected, "stored revision moved");
            return Ok(false);
        }
        table.insert(entity.id().clone(), entity.clone());
        self.write_table(ENTITIES, &table)?;
        Ok(true)
    }

    fn claim_writer(&self) -> CollabResult<WriterClaim> {
        let file = self.lock_file(WRITER_LOCK)?;
        match file.try_lock() {
            Ok(()) => Ok(WriterClaim::locked(file)),
            Err(TryLockError::WouldBlock) => Err(CollabError::unavailable(
                "store",
                format!("another cycle is writing to {}", self.root_dir.display()),
            )),
            Err(TryLockError::Error(e)) => Err(CollabError::unavailable("store", e.to_string())),
        }
    }
}

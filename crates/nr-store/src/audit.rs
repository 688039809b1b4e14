//! Append-only audit log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use nr_core::{CollabError, CollabResult};
use parking_lot::Mutex;

use crate::StoreResult;
use crate::types::AuditRecord;

/// Destination for audit records.
///
/// `append` must either persist the record or return an error; callers
/// treat an error as fatal for the running cycle.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> CollabResult<()>;
}

/// JSON-lines file, one record per line.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    // Serializes appends from parallel workers within this process.
    lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub fn new(path: PathBuf) -> StoreResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> StoreResult<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for line in content.lines() {
            if !line.trim().is_empty() {
                records.push(serde_json::from_str(line)?);
            }
        }
        Ok(records)
    }
}

impl AuditSink for JsonlAuditLog {
    fn append(&self, record: &AuditRecord) -> CollabResult<()> {
        let _guard = self.lock.lock();
        let mut line = serde_json::to_string(record)
            .map_err(|e| CollabError::rejected("audit log", e.to_string()))?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CollabError::unavailable("audit log", e.to_string()))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| CollabError::unavailable("audit log", e.to_string()))
    }
}

/// In-memory audit log for tests; can be switched off to simulate an
/// unavailable sink.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
    unavailable: Mutex<bool>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, record: &AuditRecord) -> CollabResult<()> {
        if *self.unavailable.lock() {
            return Err(CollabError::unavailable("audit log", "sink offline"));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

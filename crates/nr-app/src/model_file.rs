//! JSON model file acting as the model collaborator.

use std::fs;
use std::path::{Path, PathBuf};

use nr_core::{CollabError, CollabResult, EntityId, Revision};
use nr_graph::{Entity, ModelCollaborator, Pipe, Structure};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// On-disk shape of a model file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub structures: Vec<Structure>,
    #[serde(default)]
    pub pipes: Vec<Pipe>,
}

impl ModelDocument {
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| AppError::ModelFileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Model(format!("Failed to parse model JSON: {}", e)))
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Model(format!("Failed to serialize model: {}", e)))?;
        let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, content)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Replace one entity's fields, bumping its revision. Returns the new
    /// revision, or `None` when no entity of that kind has the id.
    fn replace(&mut self, id: &EntityId, fields: &Entity) -> Option<Revision> {
        match fields {
            Entity::Structure(s) => {
                let slot = self.structures.iter_mut().find(|x| &x.id == id)?;
                let next = slot.revision.next();
                *slot = s.clone().with_revision(next);
                Some(next)
            }
            Entity::Pipe(p) => {
                let slot = self.pipes.iter_mut().find(|x| &x.id == id)?;
                let next = slot.revision.next();
                *slot = p.clone().with_revision(next);
                Some(next)
            }
        }
    }
}

/// Model collaborator over a JSON file.
///
/// Every list call re-reads the file, so a snapshot sees edits made by
/// other tools between cycles. Writes are read-modify-write under a lock.
#[derive(Debug)]
pub struct FileModel {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileModel {
    pub fn open(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::ModelFileRead {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> CollabResult<ModelDocument> {
        ModelDocument::load(&self.path).map_err(|e| match e {
            AppError::ModelFileRead { .. } => CollabError::unavailable("model", e.to_string()),
            other => CollabError::rejected("model", other.to_string()),
        })
    }
}

impl ModelCollaborator for FileModel {
    fn list_structures(&self) -> CollabResult<Vec<Structure>> {
        Ok(self.read()?.structures)
    }

    fn list_pipes(&self) -> CollabResult<Vec<Pipe>> {
        Ok(self.read()?.pipes)
    }

    fn write_entity(&self, id: &EntityId, fields: &Entity) -> CollabResult<Revision> {
        if fields.id() != id {
            return Err(CollabError::rejected(
                "model",
                format!("fields for {} do not match entity {id}", fields.id()),
            ));
        }
        let _guard = self.lock.lock();
        let mut doc = self.read()?;
        let revision = doc
            .replace(id, fields)
            .ok_or_else(|| CollabError::rejected("model", format!("no {} {id}", fields.kind())))?;
        doc.save(&self.path)
            .map_err(|e| CollabError::unavailable("model", e.to_string()))?;
        debug!(entity = %id, %revision, "model entity written");
        Ok(revision)
    }
}

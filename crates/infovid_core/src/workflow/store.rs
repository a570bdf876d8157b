//! Workflow persistence.
//!
//! The orchestrator owns workflows through a `WorkflowStore`. Two stores are
//! provided: an in-memory map and a directory of `{id}.json` files written
//! atomically (temp file, then rename).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;

use super::types::Workflow;

/// Errors from workflow stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize workflow '{id}': {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage seam for workflow records.
pub trait WorkflowStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Workflow>;

    /// Insert or replace.
    fn put(&self, workflow: Workflow) -> Result<(), StoreError>;

    /// Remove; returns true if the id existed.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;

    fn ids(&self) -> Vec<String>;
}

/// Workflows held in a map (tests, one-shot CLI runs).
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<String, Workflow>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn get(&self, id: &str) -> Option<Workflow> {
        self.workflows.read().get(id).cloned()
    }

    fn put(&self, workflow: Workflow) -> Result<(), StoreError> {
        self.workflows.write().insert(workflow.id.clone(), workflow);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.workflows.write().remove(id).is_some())
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// One JSON file per workflow with an in-memory read cache.
#[derive(Debug)]
pub struct JsonFileWorkflowStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Workflow>>,
}

impl JsonFileWorkflowStore {
    /// Open (creating if needed) a store directory and load existing records.
    ///
    /// Unreadable files are skipped with a warning.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut cache = HashMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_workflow(&path) {
                Ok(workflow) => {
                    cache.insert(workflow.id.clone(), workflow);
                }
                Err(e) => tracing::warn!("Skipping workflow file {}: {}", path.display(), e),
            }
        }
        tracing::debug!("Loaded {} workflows from {}", cache.len(), dir.display());

        Ok(Self {
            dir,
            cache: RwLock::new(cache),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", crate::logging::sanitize_filename(id)))
    }
}

fn load_workflow(path: &Path) -> Result<Workflow, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

impl WorkflowStore for JsonFileWorkflowStore {
    fn get(&self, id: &str) -> Option<Workflow> {
        self.cache.read().get(id).cloned()
    }

    fn put(&self, workflow: Workflow) -> Result<(), StoreError> {
        let path = self.path_for(&workflow.id);
        let json = serde_json::to_string_pretty(&workflow).map_err(|source| {
            StoreError::Serialize {
                id: workflow.id.clone(),
                source,
            }
        })?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .and_then(|_| fs::rename(&temp_path, &path))
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        self.cache.write().insert(workflow.id.clone(), workflow);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let existed = self.cache.write().remove(id).is_some();
        let path = self.path_for(id);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| StoreError::Io { path, source })?;
        }
        Ok(existed)
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cache.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

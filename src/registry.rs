// src/registry.rs

//! Durable store of process definitions and the global config.
//!
//! The registry is plain data plus persistence; it never touches processes.
//! Every mutation is applied in memory first and then the whole state file
//! is rewritten atomically. When that write fails the caller receives
//! [`ProcwardError::Persistence`] but the in-memory change stands.
//!
//! The file is written outside the state lock, so readers never wait on
//! disk I/O. Each mutation serializes a numbered snapshot under the state
//! lock; a snapshot older than one already written is skipped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info};

use crate::config::model::{new_id, GlobalConfig, ProcessDefinition, RawStateFile, StateFile};
use crate::config::validate_definition;
use crate::errors::{ProcwardError, Result};
use crate::fs::FileSystem;

#[derive(Debug)]
pub struct ProcessRegistry {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    state: Mutex<StateFile>,
    /// Bumped on every mutation, under the state lock.
    revision: AtomicU64,
    writes: Mutex<LastWrite>,
}

/// Outcome of the newest snapshot handed to the filesystem.
#[derive(Debug, Default)]
struct LastWrite {
    revision: u64,
    failed: bool,
}

/// Serialized state at a given revision, ready to be written.
struct Snapshot {
    revision: u64,
    json: String,
}

impl ProcessRegistry {
    /// Load the state file at `path`, creating an empty one if it does not
    /// exist yet.
    ///
    /// A malformed file or an invalid stored definition is an error: the
    /// file is left untouched so no user data is lost.
    pub fn open(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !fs.exists(&path) {
            info!(path = %path.display(), "state file not found; starting with no definitions");
            let registry = Self::new(fs, path, StateFile::default());
            let snapshot = registry.snapshot(&registry.state())?;
            registry.persist(snapshot)?;
            return Ok(registry);
        }

        let contents = fs.read_to_string(&path)?;
        let state = if contents.trim().is_empty() {
            StateFile::default()
        } else {
            let raw: RawStateFile = serde_json::from_str(&contents)?;
            StateFile::try_from(raw)?
        };

        info!(
            path = %path.display(),
            processes = state.processes.len(),
            auto_start_on_open = state.auto_start_on_open,
            "loaded state file"
        );

        Ok(Self::new(fs, path, state))
    }

    fn new(fs: Arc<dyn FileSystem>, path: PathBuf, state: StateFile) -> Self {
        Self {
            fs,
            path,
            state: Mutex::new(state),
            revision: AtomicU64::new(0),
            writes: Mutex::new(LastWrite::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate `def`, assign it a fresh id and store it. The incoming id is
    /// ignored.
    pub fn add(&self, mut def: ProcessDefinition) -> Result<String> {
        validate_definition(&def)?;

        let snapshot = {
            let mut state = self.state();
            let mut id = new_id();
            while state.processes.iter().any(|p| p.id == id) {
                id = new_id();
            }
            def.id = id;

            info!(id = %def.id, name = %def.name, path = %def.path, "adding process definition");
            state.processes.push(def.clone());
            self.snapshot(&state)?
        };
        self.persist(snapshot)?;
        Ok(def.id)
    }

    /// Replace the stored definition with the same id.
    pub fn update(&self, def: ProcessDefinition) -> Result<()> {
        validate_definition(&def)?;

        let snapshot = {
            let mut state = self.state();
            let slot = state
                .processes
                .iter_mut()
                .find(|p| p.id == def.id)
                .ok_or_else(|| ProcwardError::NotFound(def.id.clone()))?;

            debug!(id = %def.id, "updating process definition");
            *slot = def;
            self.snapshot(&state)?
        };
        self.persist(snapshot)
    }

    /// Drop the definition with `id`.
    ///
    /// Callers must make sure the instance is idle first; the engine's delete
    /// path does this inside the instance's command stream.
    pub fn remove(&self, id: &str) -> Result<ProcessDefinition> {
        let (removed, snapshot) = {
            let mut state = self.state();
            let index = state
                .processes
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| ProcwardError::NotFound(id.to_string()))?;

            let removed = state.processes.remove(index);
            info!(id = %id, name = %removed.name, "removed process definition");
            (removed, self.snapshot(&state)?)
        };
        self.persist(snapshot)?;
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Result<ProcessDefinition> {
        self.state()
            .processes
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ProcwardError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state().processes.iter().any(|p| p.id == id)
    }

    /// All definitions in insertion order.
    pub fn list(&self) -> Vec<ProcessDefinition> {
        self.state().processes.clone()
    }

    pub fn global_config(&self) -> GlobalConfig {
        self.state().global()
    }

    pub fn set_global_config(&self, config: GlobalConfig) -> Result<()> {
        let snapshot = {
            let mut state = self.state();
            state.auto_start_on_open = config.auto_start_on_open;
            info!(auto_start_on_open = config.auto_start_on_open, "saving global config");
            self.snapshot(&state)?
        };
        self.persist(snapshot)
    }

    fn state(&self) -> MutexGuard<'_, StateFile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialize `state`. Call with the state lock held.
    fn snapshot(&self, state: &StateFile) -> Result<Snapshot> {
        Ok(Snapshot {
            revision: self.revision.fetch_add(1, Ordering::SeqCst) + 1,
            json: serde_json::to_string_pretty(state)?,
        })
    }

    /// Write `snapshot` unless a newer one already reached the filesystem.
    fn persist(&self, snapshot: Snapshot) -> Result<()> {
        let mut last = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        if snapshot.revision < last.revision {
            debug!(
                revision = snapshot.revision,
                written = last.revision,
                "state snapshot superseded; skipping write"
            );
            return if last.failed {
                Err(ProcwardError::Persistence(format!(
                    "{}: a later write of the state file failed",
                    self.path.display()
                )))
            } else {
                Ok(())
            };
        }

        let result = self
            .fs
            .write_atomic(&self.path, snapshot.json.as_bytes())
            .map_err(|err| {
                error!(path = %self.path.display(), error = %err, "failed to persist state file");
                ProcwardError::Persistence(format!("{}: {err:#}", self.path.display()))
            });
        *last = LastWrite {
            revision: snapshot.revision,
            failed: result.is_err(),
        };
        result
    }
}

//! Local file backend for state storage
//!
//! State is kept in a JSON file (default: kiln.state.json) next to a `.lock`
//! file holding the current lock.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use kiln_core::config::BackendConfig;

use crate::backend::{BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "kiln.state.json";

    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: PathBuf) -> Self {
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    /// Create a LocalBackend from configuration (`path` attribute)
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        match config.attributes.get("path") {
            None => Ok(Self::new()),
            Some(_) => {
                let path = config
                    .get_string("path")
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        BackendError::configuration("local backend 'path' must be a non-empty string")
                    })?;
                Ok(Self::with_path(PathBuf::from(path)))
            }
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    async fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        match tokio::fs::read_to_string(&self.lock_path).await {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| BackendError::InvalidState(format!("Failed to parse lock file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::Io(format!("Failed to read lock file: {}", e))),
        }
    }

    /// Create the lock file only if none exists
    ///
    /// Returns `false` when another lock file is already in place.
    async fn create_lock_file(&self, content: &str) -> BackendResult<bool> {
        if let Some(parent) = self.lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::Io(format!("Failed to create state directory: {}", e)))?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(BackendError::Io(format!("Failed to create lock file: {}", e))),
        };

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write lock file: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write lock file: {}", e)))?;
        Ok(true)
    }

    async fn remove_lock(&self) -> BackendResult<()> {
        tokio::fs::remove_file(&self.lock_path)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to remove lock file: {}", e)))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match tokio::fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::Io(format!("Failed to read state file: {}", e))),
        };

        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("Failed to parse state file: {}", e))
        })?;

        if state.version > StateFile::CURRENT_VERSION {
            return Err(BackendError::InvalidState(format!(
                "State file version {} is newer than supported version {}",
                state.version,
                StateFile::CURRENT_VERSION
            )));
        }

        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        let content = serde_json::to_string_pretty(state).map_err(|e| {
            BackendError::Serialization(format!("Failed to serialize state: {}", e))
        })?;

        if let Some(parent) = self.state_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::Io(format!("Failed to create state directory: {}", e)))?;
        }

        // Write to a sibling file first so a crash never leaves a truncated state
        let tmp_path = self.state_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write state file: {}", e)))?;
        tokio::fs::rename(&tmp_path, &self.state_path)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write state file: {}", e)))?;

        log::debug!("Wrote state serial {} to {}", state.serial, self.state_path.display());
        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        let lock = LockInfo::new(operation);
        let content = serde_json::to_string_pretty(&lock)
            .map_err(|e| BackendError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        if self.create_lock_file(&content).await? {
            return Ok(lock);
        }

        // Only an expired lock may be taken over; an unreadable one needs force-unlock
        if let Some(existing) = self.read_lock().await? {
            if !existing.is_expired() {
                return Err(BackendError::locked(&existing));
            }
            log::warn!(
                "Taking over expired lock {} held by {}",
                existing.id,
                existing.who
            );
            match tokio::fs::remove_file(&self.lock_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(BackendError::Io(format!("Failed to remove lock file: {}", e)));
                }
            }
        }

        if self.create_lock_file(&content).await? {
            return Ok(lock);
        }
        match self.read_lock().await? {
            Some(existing) => Err(BackendError::locked(&existing)),
            None => Err(BackendError::Io(
                "Lock file changed while acquiring the lock".to_string(),
            )),
        }
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let existing = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock.id.clone()))?;

        if existing.id != lock.id {
            return Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }

        self.remove_lock().await
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        if !self.lock_path.exists() {
            return Err(BackendError::LockNotFound(lock_id.to_string()));
        }

        if let Ok(Some(existing)) = self.read_lock().await
            && existing.id != lock_id
        {
            return Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }

        self.remove_lock().await
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{errors::StorageError, models::Role};

/// Key of the opaque bearer credential.
pub const TOKEN_KEY: &str = "token";
/// Key of the advisory role hint. Never trusted for authorization.
pub const ROLE_KEY: &str = "role";

// 1. TokenStore Contract
/// TokenStore
///
/// The durable key-value slot that survives a restart of the shell. Only the Session
/// Store writes to it; everything else may read the token through the store's handle.
///
/// This trait lets us swap the file-backed slot used at runtime for the in-memory
/// one (`MemoryTokenStore`) in tests.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Persisted layout. Both keys are absent when logged out.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SlotFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

impl SlotFile {
    fn field(&mut self, key: &str) -> Result<&mut Option<String>, StorageError> {
        match key {
            TOKEN_KEY => Ok(&mut self.token),
            ROLE_KEY => Ok(&mut self.role),
            other => Err(StorageError::Unavailable(format!("unknown key `{}`", other))),
        }
    }
}

// 2. The Real Implementation (JSON file on disk)
/// FileTokenStore
///
/// Keeps the slot as a small JSON document. Writes go to a sibling temp file first and
/// are then renamed over the original, so a crash mid-write never leaves a torn file.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_slot(&self) -> Result<SlotFile, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(SlotFile::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SlotFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_slot(&self, slot: &SlotFile) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(slot)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut slot = self.read_slot().await?;
        Ok(slot.field(key)?.take())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slot = self.read_slot().await?;
        *slot.field(key)? = Some(value.to_string());
        self.write_slot(&slot).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut slot = match self.read_slot().await {
            Ok(slot) => slot,
            // A corrupt file is replaced rather than blocking a logout.
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!(error = %e, path = %self.path.display(), "Discarding corrupt token store");
                SlotFile::default()
            }
            Err(e) => return Err(e),
        };
        *slot.field(key)? = None;
        self.write_slot(&slot).await
    }
}

// 3. The Mock Implementation (For Unit Tests)
/// MemoryTokenStore
///
/// In-memory slot used in tests. Clones share the same underlying map so a test can keep
/// one handle to inspect what the Session Store persisted.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<SlotState>>,
    /// When true, every write returns a simulated failure.
    pub should_fail: bool,
}

#[derive(Default)]
struct SlotState {
    token: Option<String>,
    role: Option<String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Seeds the slot as if a previous run had logged in.
    pub fn with_token(token: &str, role: Role) -> Self {
        let store = Self::new();
        if let Ok(mut slot) = store.slot.lock() {
            slot.token = Some(token.to_string());
            slot.role = Some(role.as_str().to_string());
        }
        store
    }

    pub fn token(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.token.clone())
    }

    pub fn role(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.role.clone())
    }

    fn with_slot<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Option<String>) -> R,
    ) -> Result<R, StorageError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| StorageError::Unavailable("memory slot poisoned".to_string()))?;
        match key {
            TOKEN_KEY => Ok(f(&mut slot.token)),
            ROLE_KEY => Ok(f(&mut slot.role)),
            other => Err(StorageError::Unavailable(format!("unknown key `{}`", other))),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_slot(key, |value| value.clone())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        self.with_slot(key, |slot| *slot = Some(value.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        self.with_slot(key, |slot| *slot = None)
    }
}

/// TokenStoreState
///
/// The concrete type used to share the token slot between the Session Store and tests.
pub type TokenStoreState = Arc<dyn TokenStore>;

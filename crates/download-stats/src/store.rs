// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Persistence backends for run state.
//!
//! Cursor and bot status state are plain serde documents. Where they live is decided by a
//! [`StateStore`]: the agent uses [`JsonFileStore`], tests and embedders can use
//! [`MemoryStore`] or their own backend without touching the pipeline.

use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::errors::StoreError;

pub trait StateStore<T> {
    /// Returns `Ok(None)` when nothing was ever saved.
    fn load(&self) -> Result<Option<T>, StoreError>;

    fn save(&self, state: &T) -> Result<(), StoreError>;
}

/// Stores a document as pretty-printed JSON, replacing the file atomically on save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("state"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl<T> StateStore<T> for JsonFileStore
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state at {}, starting empty", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, state: &T) -> Result<(), StoreError> {
        let body =
            serde_json::to_vec_pretty(state).map_err(|source| StoreError::Serialization {
                path: self.path.clone(),
                source,
            })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).map_err(|e| self.io_error(e))?;
        file.write_all(&body).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(e))
    }
}

/// In-process store. Clones share the same slot.
#[derive(Debug)]
pub struct MemoryStore<T> {
    slot: Arc<Mutex<Option<T>>>,
    saves: Arc<Mutex<usize>>,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            saves: Arc::clone(&self.saves),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            saves: Arc::new(Mutex::new(0)),
        }
    }
}

impl<T: Clone> MemoryStore<T> {
    pub fn with_state(state: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(state))),
            saves: Arc::new(Mutex::new(0)),
        }
    }

    pub fn get(&self) -> Option<T> {
        #[allow(clippy::expect_used)]
        let slot = self.slot.lock().expect("lock poisoned");
        slot.clone()
    }

    /// Number of times [`StateStore::save`] was called.
    pub fn save_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        let saves = self.saves.lock().expect("lock poisoned");
        *saves
    }
}

impl<T: Clone> StateStore<T> for MemoryStore<T> {
    fn load(&self) -> Result<Option<T>, StoreError> {
        Ok(self.get())
    }

    fn save(&self, state: &T) -> Result<(), StoreError> {
        #[allow(clippy::expect_used)]
        {
            *self.slot.lock().expect("lock poisoned") = Some(state.clone());
            *self.saves.lock().expect("lock poisoned") += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_json_store_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("missing.json"));
        let loaded: Option<BTreeMap<String, u64>> = store.load().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_json_store_save_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = JsonFileStore::new(&path);

        let mut state = BTreeMap::new();
        state.insert("a".to_string(), 1_u64);
        store.save(&state).unwrap();
        state.insert("b".to_string(), 2_u64);
        store.save(&state).unwrap();

        let loaded: Option<BTreeMap<String, u64>> = store.load().unwrap();
        assert_eq!(loaded, Some(state));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_json_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(&path);
        let loaded: Result<Option<BTreeMap<String, u64>>, _> = store.load();
        assert!(matches!(loaded, Err(StoreError::Serialization { .. })));
    }

    #[test]
    fn test_memory_store_shares_state_between_clones() {
        let store: MemoryStore<u32> = MemoryStore::default();
        let observer = store.clone();
        assert_eq!(observer.load().unwrap(), None);
        store.save(&7).unwrap();
        assert_eq!(observer.get(), Some(7));
        assert_eq!(observer.save_count(), 1);
    }
}

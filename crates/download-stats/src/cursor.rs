// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-source read position, persisted between runs.
//!
//! On disk: `{"files": {"/abs/path/access.log": {"size": 1024, "offset": 1024}}}`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::StoreError;
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePosition {
    /// File size observed when the source was last read.
    pub size: u64,
    /// Byte offset of the first unread line.
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    #[serde(default)]
    pub files: BTreeMap<String, FilePosition>,
}

pub struct CursorStore {
    backend: Box<dyn StateStore<CursorState>>,
    state: CursorState,
}

fn source_key(source: &Path) -> String {
    source.to_string_lossy().into_owned()
}

impl CursorStore {
    pub fn open(backend: Box<dyn StateStore<CursorState>>) -> Result<Self, StoreError> {
        let state = backend.load()?.unwrap_or_default();
        Ok(Self { backend, state })
    }

    pub fn position(&self, source: &Path) -> Option<FilePosition> {
        self.state.files.get(&source_key(source)).copied()
    }

    /// False iff the file has the exact size recorded by the previous run.
    pub fn should_process(&self, source: &Path, current_size: u64) -> bool {
        self.position(source)
            .map_or(true, |position| position.size != current_size)
    }

    /// Stored offset, or 0 for an unknown source.
    pub fn seek_offset(&self, source: &Path) -> u64 {
        self.position(source).map_or(0, |position| position.offset)
    }

    /// Offset to resume from given the current file size.
    ///
    /// A file smaller than its recorded size, or than the stored offset, was truncated or
    /// replaced, so reading restarts from the beginning.
    pub fn resume_offset(&self, source: &Path, current_size: u64) -> u64 {
        let Some(position) = self.position(source) else {
            return 0;
        };
        if current_size < position.size || position.offset > current_size {
            warn!(
                "{} shrank from {} to {current_size} bytes (stored offset {}), reading from start",
                source.display(),
                position.size,
                position.offset
            );
            return 0;
        }
        position.offset
    }

    /// Records the position reached by a completed run and persists it.
    pub fn record(&mut self, source: &Path, size: u64, offset: u64) -> Result<(), StoreError> {
        self.state
            .files
            .insert(source_key(source), FilePosition { size, offset });
        self.backend.save(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileStore, MemoryStore};
    use std::path::PathBuf;

    fn source() -> PathBuf {
        PathBuf::from("/var/log/portal/access.log")
    }

    #[test]
    fn test_unknown_source() {
        let store = CursorStore::open(Box::new(MemoryStore::default())).unwrap();
        assert!(store.should_process(&source(), 0));
        assert!(store.should_process(&source(), 10));
        assert_eq!(store.seek_offset(&source()), 0);
    }

    #[test]
    fn test_same_size_is_skipped() {
        let backend = MemoryStore::default();
        let mut store = CursorStore::open(Box::new(backend.clone())).unwrap();
        store.record(&source(), 120, 100).unwrap();

        assert!(!store.should_process(&source(), 120));
        assert!(store.should_process(&source(), 180));
        assert_eq!(store.seek_offset(&source()), 100);
        assert_eq!(backend.save_count(), 1);
    }

    #[test]
    fn test_resume_offset_resets_on_truncation() {
        let mut store = CursorStore::open(Box::new(MemoryStore::default())).unwrap();
        store.record(&source(), 500, 500).unwrap();
        assert_eq!(store.resume_offset(&source(), 800), 500);
        assert_eq!(store.resume_offset(&source(), 200), 0);
    }

    #[test]
    fn test_resume_offset_resets_when_file_shrank_below_recorded_size() {
        let mut store = CursorStore::open(Box::new(MemoryStore::default())).unwrap();
        // Last run stopped before a torn tail, so the offset trails the size.
        store.record(&source(), 1000, 900).unwrap();
        assert_eq!(store.resume_offset(&source(), 950), 0);
        assert_eq!(store.resume_offset(&source(), 1000), 900);
        assert_eq!(store.resume_offset(&source(), 1200), 900);
    }

    #[test]
    fn test_sources_are_tracked_independently() {
        let mut store = CursorStore::open(Box::new(MemoryStore::default())).unwrap();
        let other = PathBuf::from("/var/log/portal/other.log");
        store.record(&source(), 10, 10).unwrap();
        assert_eq!(store.seek_offset(&other), 0);
        assert!(store.should_process(&other, 10));
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = CursorStore::open(Box::new(JsonFileStore::new(&path))).unwrap();
        store.record(&source(), 42, 40).unwrap();

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            on_disk,
            serde_json::json!({"files": {"/var/log/portal/access.log": {"size": 42, "offset": 40}}})
        );

        let reopened = CursorStore::open(Box::new(JsonFileStore::new(&path))).unwrap();
        assert_eq!(
            reopened.position(&source()),
            Some(FilePosition { size: 42, offset: 40 })
        );
    }
}

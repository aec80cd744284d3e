//! Durable per-file processing state.
//!
//! The store keeps the latest [`ProcessingState`] for every absolute path in a
//! concurrent map and mirrors the whole map to a JSON file after each
//! mutation. Rewrites go through a temp file in the same directory and an
//! atomic rename, so a crash loses at most the newest update.

use crate::error::IngestResult;
use dashmap::DashMap;
use lore_core::{ProcessingState, ProcessingStatus, Snapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Processing state of every file seen so far, backed by a JSON file.
pub struct StateStore {
    state_file: Option<PathBuf>,
    states: DashMap<String, ProcessingState>,
    /// Serializes every read and rewrite of `state_file`.
    io_lock: RwLock<()>,
}

impl StateStore {
    /// Open the store backed by `state_file`, loading whatever it holds.
    ///
    /// A missing or unreadable file starts the store empty. Passing `None`
    /// keeps state in memory only.
    pub fn open(state_file: Option<PathBuf>) -> Self {
        let store = Self {
            state_file,
            states: DashMap::new(),
            io_lock: RwLock::new(()),
        };
        store.load();
        store
    }

    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            state_file: None,
            states: DashMap::new(),
            io_lock: RwLock::new(()),
        }
    }

    /// Whether the file behind `snapshot` is new or changed since its last record.
    ///
    /// Only size and modification time are compared; content is never hashed.
    /// A record still marked processing belongs to an interrupted run and is
    /// retried regardless of its fingerprint.
    pub fn should_process(&self, snapshot: &Snapshot) -> bool {
        match self.states.get(&snapshot.absolute_path) {
            Some(state) => !state.matches(snapshot) || !state.status.is_terminal(),
            None => true,
        }
    }

    pub fn mark_processing(&self, snapshot: &Snapshot) {
        self.update(snapshot, ProcessingStatus::Processing);
    }

    pub fn mark_success(&self, snapshot: &Snapshot, segments: u64) {
        self.update(snapshot, ProcessingStatus::Success { segments });
    }

    pub fn mark_skipped(&self, snapshot: &Snapshot) {
        self.update(snapshot, ProcessingStatus::Skipped);
    }

    pub fn mark_failure(&self, snapshot: &Snapshot, message: impl Into<String>) {
        self.update(
            snapshot,
            ProcessingStatus::Failed {
                message: message.into(),
            },
        );
    }

    /// Latest record for `absolute_path`.
    pub fn get(&self, absolute_path: &str) -> Option<ProcessingState> {
        self.states.get(absolute_path).map(|s| s.value().clone())
    }

    /// Point-in-time copy of all records.
    pub fn snapshot_states(&self) -> HashMap<String, ProcessingState> {
        self.states
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Read a state file without opening a store on it.
    pub fn read_persisted(path: &Path) -> IngestResult<Vec<ProcessingState>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn update(&self, snapshot: &Snapshot, status: ProcessingStatus) {
        debug!("{} -> {}", snapshot.absolute_path, status);
        let state = ProcessingState::new(snapshot, status);
        self.states.insert(snapshot.absolute_path.clone(), state);
        self.persist();
    }

    fn load(&self) {
        let Some(path) = self.state_file.as_deref() else {
            warn!("No state file location configured, processing state will not be persisted");
            return;
        };

        let _guard = self.io_lock.read();
        if !path.exists() {
            info!("No state file at {:?}, starting with empty state", path);
            return;
        }

        match Self::read_persisted(path) {
            Ok(list) => {
                let count = list.len();
                for state in list {
                    self.states.insert(state.file_path.clone(), state);
                }
                info!("Loaded {} processing states from {:?}", count, path);
            }
            Err(e) => {
                warn!("Failed to read state file {:?}, starting empty: {}", path, e);
            }
        }
    }

    fn persist(&self) {
        let Some(path) = self.state_file.as_deref() else {
            return;
        };

        // Collect under the lock so the last writer always sees every earlier insert.
        let _guard = self.io_lock.write();
        let mut states: Vec<ProcessingState> =
            self.states.iter().map(|entry| entry.value().clone()).collect();
        states.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        if let Err(e) = write_atomically(path, &states) {
            warn!("Failed to write state file {:?}: {}", path, e);
        }
    }
}

fn write_atomically(path: &Path, states: &[ProcessingState]) -> IngestResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!("{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, states)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn snapshot(path: &str, size: u64, modified: i64) -> Snapshot {
        Snapshot::new(path, size, modified)
    }

    #[test]
    fn test_unknown_file_should_be_processed() {
        let store = StateStore::in_memory();
        assert!(store.should_process(&snapshot("/docs/a.txt", 1, 1)));
    }

    #[test]
    fn test_change_detection() {
        let store = StateStore::in_memory();
        let original = snapshot("/docs/a.txt", 100, 1_000);
        store.mark_success(&original, 2);

        assert!(!store.should_process(&original));
        assert!(store.should_process(&snapshot("/docs/a.txt", 101, 1_000)));
        assert!(store.should_process(&snapshot("/docs/a.txt", 100, 2_000)));
    }

    #[test]
    fn test_interrupted_record_is_retried() {
        let store = StateStore::in_memory();
        let snap = snapshot("/docs/a.txt", 100, 1_000);
        store.mark_processing(&snap);
        assert!(store.should_process(&snap));

        store.mark_skipped(&snap);
        assert!(!store.should_process(&snap));
    }

    #[test]
    fn test_marks_replace_whole_record() {
        let store = StateStore::in_memory();
        let snap = snapshot("/docs/a.txt", 100, 1_000);

        store.mark_failure(&snap, "parse error");
        assert_eq!(store.get("/docs/a.txt").unwrap().last_error(), Some("parse error"));

        store.mark_success(&snap, 4);
        let state = store.get("/docs/a.txt").unwrap();
        assert_eq!(state.last_error(), None);
        assert_eq!(state.processed_segments(), 4);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(".state.json");

        let store = StateStore::open(Some(file.clone()));
        store.mark_success(&snapshot("/docs/a.txt", 10, 1), 3);
        store.mark_skipped(&snapshot("/docs/b.txt", 0, 1));
        store.mark_failure(&snapshot("/docs/c.pdf", 5, 1), "encrypted");
        drop(store);

        let reopened = StateStore::open(Some(file.clone()));
        assert_eq!(reopened.len(), 3);
        assert!(!reopened.should_process(&snapshot("/docs/a.txt", 10, 1)));
        assert_eq!(
            reopened.get("/docs/c.pdf").unwrap().last_error(),
            Some("encrypted")
        );

        let persisted = StateStore::read_persisted(&file).unwrap();
        let paths: Vec<_> = persisted.iter().map(|s| s.file_path.as_str()).collect();
        assert_eq!(paths, vec!["/docs/a.txt", "/docs/b.txt", "/docs/c.pdf"]);
    }

    #[test]
    fn test_corrupt_state_file_starts_empty() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(".state.json");
        std::fs::write(&file, "{ not json").unwrap();

        let store = StateStore::open(Some(file.clone()));
        assert!(store.is_empty());

        // The next mutation replaces the corrupt file with a valid one.
        store.mark_skipped(&snapshot("/docs/a.txt", 1, 1));
        assert_eq!(StateStore::read_persisted(&file).unwrap().len(), 1);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(".state.json");
        let store = StateStore::open(Some(file));

        for i in 0..5 {
            store.mark_success(&snapshot(&format!("/docs/{i}.txt"), 1, 1), 1);
        }

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![".state.json".to_string()]);
    }

    #[test]
    fn test_concurrent_updates_all_persisted() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(".state.json");
        let store = Arc::new(StateStore::open(Some(file.clone())));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let snap = snapshot(&format!("/docs/{t}-{i}.txt"), 1, 1);
                        store.mark_processing(&snap);
                        store.mark_success(&snap, 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 80);
        let persisted = StateStore::read_persisted(&file).unwrap();
        assert_eq!(persisted.len(), 80);
        assert!(persisted
            .iter()
            .all(|s| s.status == ProcessingStatus::Success { segments: 1 }));
    }
}

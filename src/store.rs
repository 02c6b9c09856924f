//! File-backed history of publisher cycles, newest first.
//!
//! The publisher owns the only [`HistoryStore`] and is the single writer.
//! The HTTP layer reads the same file through a [`HistoryReader`]. Saves go
//! through a temp file in the target directory followed by a rename, so a
//! reader sees either the previous file or the new one. File access runs on
//! the blocking pool so neither side stalls the runtime's worker threads.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::HistoryEntry;

// ---

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("history encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("history file task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Read a history file; a missing or unreadable/corrupt file is empty.
fn read_entries(path: &Path) -> Vec<HistoryEntry> {
    // ---
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("Read error on {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Parse error on {}: {}, starting empty", path.display(), e);
            Vec::new()
        }
    }
}

/// Replace `path` with `body` via a temp file in the same directory.
fn write_atomic(path: &Path, body: &[u8]) -> Result<(), StoreError> {
    // ---
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(body).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Bounded, persisted list of history entries.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// Open the store at `path`, keeping at most `max_entries` entries.
    ///
    /// Never fails: a missing or corrupt file yields an empty store.
    pub fn load(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        // ---
        let path = path.into();
        let mut entries = read_entries(&path);
        entries.truncate(max_entries);
        tracing::info!(
            "Loaded {} history entries from {}",
            entries.len(),
            path.display()
        );
        Self {
            path,
            max_entries,
            entries,
        }
    }

    /// Insert `entry` as the newest, dropping the oldest past the cap.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(self.max_entries);
    }

    /// Write the (capped) entries to disk, replacing the file atomically.
    pub async fn save(&mut self) -> Result<(), StoreError> {
        // ---
        self.entries.truncate(self.max_entries);
        let body = serde_json::to_vec_pretty(&self.entries)?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &body)).await??;

        tracing::debug!(
            "Saved {} history entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// All entries, newest first.
    #[cfg(test)]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read-only view of a history file for concurrent readers.
#[derive(Debug, Clone)]
pub struct HistoryReader {
    path: PathBuf,
}

impl HistoryReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Current entries on disk, newest first.
    pub async fn entries(&self) -> Vec<HistoryEntry> {
        // ---
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || read_entries(&path)).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("History read task failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn latest(&self) -> Option<HistoryEntry> {
        self.entries().await.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Diagnosis, Snapshot};
    use std::collections::BTreeMap;

    fn entry(n: usize) -> HistoryEntry {
        // ---
        let snapshot = Snapshot {
            timestamp: format!("2025-03-26T18:{n:02}:00Z"),
            site: "Demo Tower".to_string(),
            equipment: BTreeMap::new(),
        };
        HistoryEntry::diagnosed(
            snapshot,
            Diagnosis {
                summary: format!("cycle {n}"),
                ..Diagnosis::default()
            },
        )
    }

    fn summaries(entries: &[HistoryEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.diagnosis().unwrap().summary.clone())
            .collect()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::load(dir.path().join("history.json"), 5);
        assert!(store.entries().is_empty());
        assert!(store.latest().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, b"[{\"status\": ").unwrap();

        let store = HistoryStore::load(&path, 5);
        assert!(store.entries().is_empty());
        assert!(HistoryReader::new(&path).entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_cap_drops_oldest_and_keeps_order() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut store = HistoryStore::load(&path, 3);

        for n in 0..4 {
            store.append(entry(n));
            tokio_test::assert_ok!(store.save().await);
        }

        assert_eq!(summaries(store.entries()), ["cycle 3", "cycle 2", "cycle 1"]);
        assert_eq!(store.latest().unwrap().timestamp, "2025-03-26T18:03:00Z");

        let on_disk = HistoryReader::new(&path).entries().await;
        assert_eq!(summaries(&on_disk), ["cycle 3", "cycle 2", "cycle 1"]);
    }

    #[tokio::test]
    async fn test_reload_respects_smaller_cap() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut store = HistoryStore::load(&path, 10);
        for n in 0..6 {
            store.append(entry(n));
        }
        store.save().await.unwrap();

        let reloaded = HistoryStore::load(&path, 2);
        assert_eq!(summaries(reloaded.entries()), ["cycle 5", "cycle 4"]);
    }

    #[tokio::test]
    async fn test_persisted_layout() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let mut store = HistoryStore::load(&path, 2);
        store.append(entry(1));
        store.save().await.unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let first = &raw[0];
        assert!(first["status"].is_string());
        assert_eq!(first["timestamp"], "2025-03-26T18:01:00Z");
        assert!(first["error"].is_null());
        assert_eq!(first["snapshot"]["building"], "Demo Tower");
    }

    #[tokio::test]
    async fn test_reader_latest() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let reader = HistoryReader::new(&path);
        assert!(reader.latest().await.is_none());

        let mut store = HistoryStore::load(&path, 4);
        store.append(entry(7));
        store.append(entry(8));
        store.save().await.unwrap();

        let latest = reader.latest().await.unwrap();
        assert_eq!(latest.diagnosis().unwrap().summary, "cycle 8");
    }

    #[tokio::test]
    async fn test_reads_overlap_saves_on_single_thread_runtime() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let reader = HistoryReader::new(&path);
        let mut store = HistoryStore::load(&path, 50);

        for n in 0..20 {
            store.append(entry(n));
            let (saved, seen) = tokio::join!(store.save(), reader.entries());
            tokio_test::assert_ok!(saved);
            // A reader sees the previous file or the new one, never a torn write.
            assert!(seen.len() == n || seen.len() == n + 1, "{} at {n}", seen.len());
        }

        assert_eq!(reader.entries().await.len(), 20);
    }
}

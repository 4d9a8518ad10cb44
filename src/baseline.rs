//! BaselineStore: file-per-hash JSON snapshot history used by
//! [`crate::analyzers::regression`] to detect execution-time/score
//! regression across runs of the "same" statement.
//!
//! One JSON file per `queryHash`, shaped `{"snapshots": [...]}`,
//! directory created with mode 0755. Concurrent writers to the same hash
//! are serialized with a per-hash `DashMap<String, Mutex<()>>` lock,
//! matching the pattern `driver/mysql.rs` already uses for version
//! memoization, generalized from a single `OnceCell` to one lock per key.

use std::{
    collections::hash_map::DefaultHasher,
    fs,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    sync::{Arc, Mutex}
};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, baseline_error};

/// One persisted metric snapshot for a given query hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub query_hash: String,
    pub timestamp:  DateTime<Utc>,
    pub snapshot:   IndexMap<String, f64>
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BaselineFile {
    #[serde(default)]
    snapshots: Vec<BaselineEntry>
}

/// File-per-hash baseline history, pruned to `max_snapshots` entries and
/// (on explicit [`BaselineStore::prune`]) by age.
pub struct BaselineStore {
    dir:           PathBuf,
    max_snapshots: usize,
    locks:         DashMap<String, Arc<Mutex<()>>>
}

impl BaselineStore {
    /// Open (creating if needed) a baseline directory. Created with mode
    /// 0755 on Unix.
    pub fn new(dir: impl Into<PathBuf>, max_snapshots: usize) -> AppResult<Self> {
        let dir = dir.into();
        create_storage_dir(&dir)?;
        Ok(Self {
            dir,
            max_snapshots,
            locks: DashMap::new()
        })
    }

    fn lock_for(&self, hash: &str) -> Arc<Mutex<()>> {
        self.locks.entry(hash.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{hash}.json"))
    }

    /// Append one snapshot, trimming the oldest entries once the file
    /// exceeds `max_snapshots`.
    pub fn save(&self, hash: &str, entry: BaselineEntry) -> AppResult<()> {
        let lock = self.lock_for(hash);
        let _guard = lock.lock().map_err(|_| baseline_error("baseline lock poisoned"))?;

        let path = self.path_for(hash);
        let mut file = read_file(&path)?;
        file.snapshots.push(entry);
        if file.snapshots.len() > self.max_snapshots {
            let excess = file.snapshots.len() - self.max_snapshots;
            file.snapshots.drain(0..excess);
        }
        write_file(&path, &file)
    }

    /// Most recent snapshot for `hash`, or `None` if no history exists.
    pub fn load(&self, hash: &str) -> AppResult<Option<BaselineEntry>> {
        let lock = self.lock_for(hash);
        let _guard = lock.lock().map_err(|_| baseline_error("baseline lock poisoned"))?;

        let file = read_file(&self.path_for(hash))?;
        Ok(file.snapshots.last().cloned())
    }

    /// Last `limit` snapshots, oldest first.
    pub fn history(&self, hash: &str, limit: usize) -> AppResult<Vec<BaselineEntry>> {
        let lock = self.lock_for(hash);
        let _guard = lock.lock().map_err(|_| baseline_error("baseline lock poisoned"))?;

        let file = read_file(&self.path_for(hash))?;
        let len = file.snapshots.len();
        Ok(file.snapshots[len.saturating_sub(limit)..].to_vec())
    }

    /// Remove snapshots older than `max_age_days`; delete the file
    /// entirely once it becomes empty.
    pub fn prune(&self, max_age_days: i64) -> AppResult<()> {
        let cutoff = Utc::now() - TimeDelta::days(max_age_days);

        if !self.dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.dir).map_err(|e| baseline_error(e.to_string()))? {
            let entry = entry.map_err(|e| baseline_error(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let hash = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            let lock = self.lock_for(&hash);
            let _guard = lock.lock().map_err(|_| baseline_error("baseline lock poisoned"))?;

            let mut file = read_file(&path)?;
            file.snapshots.retain(|s| s.timestamp >= cutoff);
            if file.snapshots.is_empty() {
                fs::remove_file(&path).map_err(|e| baseline_error(e.to_string()))?;
            } else {
                write_file(&path, &file)?;
            }
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> AppResult<BaselineFile> {
    if !path.exists() {
        return Ok(BaselineFile::default());
    }
    let content = fs::read_to_string(path).map_err(|e| baseline_error(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| baseline_error(e.to_string()))
}

fn write_file(path: &Path, file: &BaselineFile) -> AppResult<()> {
    let content = serde_json::to_string_pretty(file).map_err(|e| baseline_error(e.to_string()))?;
    fs::write(path, content).map_err(|e| baseline_error(e.to_string()))
}

#[cfg(unix)]
fn create_storage_dir(dir: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::create_dir_all(dir).map_err(|e| baseline_error(e.to_string()))?;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).map_err(|e| baseline_error(e.to_string()))
}

#[cfg(not(unix))]
fn create_storage_dir(dir: &Path) -> AppResult<()> {
    fs::create_dir_all(dir).map_err(|e| baseline_error(e.to_string()))
}

/// Stable, non-cryptographic hash of a normalized SQL statement, used as
/// the baseline file key. `DefaultHasher` is deterministic within one
/// Rust/std build (fixed zero seed) and is regenerated gracefully if the
/// algorithm ever changes a future build's hashes - a cache-key, not a
/// security boundary - so no extra hashing crate is pulled in for it.
pub fn query_hash(normalized_sql: &str) -> String {
    let mut hasher = DefaultHasher::new();
    normalized_sql.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn entry(hash: &str, time_ms: f64) -> BaselineEntry {
        let mut snapshot = IndexMap::new();
        snapshot.insert("execution_time_ms".to_string(), time_ms);
        BaselineEntry {
            query_hash: hash.to_string(),
            timestamp: Utc::now(),
            snapshot
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = BaselineStore::new(dir.path(), 50).unwrap();
        store.save("abc123", entry("abc123", 12.5)).unwrap();
        let loaded = store.load("abc123").unwrap().unwrap();
        assert_eq!(loaded.snapshot.get("execution_time_ms"), Some(&12.5));
    }

    #[test]
    fn history_never_exceeds_max_snapshots() {
        let dir = tempdir().unwrap();
        let store = BaselineStore::new(dir.path(), 3).unwrap();
        for i in 0..10 {
            store.save("h", entry("h", i as f64)).unwrap();
        }
        let history = store.history("h", 100).unwrap();
        assert_eq!(history.len(), 3);
        // Oldest entries were trimmed; the most recent three survive.
        assert_eq!(history.last().unwrap().snapshot.get("execution_time_ms"), Some(&9.0));
    }

    #[test]
    fn load_on_unknown_hash_is_none() {
        let dir = tempdir().unwrap();
        let store = BaselineStore::new(dir.path(), 50).unwrap();
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn query_hash_is_stable_for_equal_input() {
        assert_eq!(query_hash("SELECT 1"), query_hash("SELECT 1"));
        assert_ne!(query_hash("SELECT 1"), query_hash("SELECT 2"));
    }
}

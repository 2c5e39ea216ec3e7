//! Persistent FinOps/GreenOps counters.
//!
//! Single-writer discipline: every mutation rewrites the stats file
//! atomically (write to a temp sibling, then rename). Persistence failures
//! are swallowed; the in-memory counters stay authoritative for the session.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// The persisted counter set. All counters increase monotonically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_jobs: u64,
    pub total_savings_usd: f64,
    pub total_co2_saved_g: f64,
    pub total_checkpoints: u64,
    pub total_evictions: u64,
}

/// Store wrapping the counters with file-backed persistence.
#[derive(Debug)]
pub struct StatsStore {
    path: PathBuf,
    state: Mutex<Stats>,
}

impl StatsStore {
    /// Load counters from disk, zero-filling on a missing or corrupt file.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("failed to create stats directory {}: {}", parent.display(), e);
            }
        }
        let stats = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::warn!("corrupt stats file {}, starting fresh: {}", path.display(), e);
                    Stats::default()
                }
            },
            Err(_) => Stats::default(),
        };
        Self {
            path,
            state: Mutex::new(stats),
        }
    }

    pub fn snapshot(&self) -> Stats {
        self.lock().clone()
    }

    /// Record a completed placement simulation.
    pub fn record_job(&self, savings_usd: f64, co2_saved_g: f64) {
        let stats = {
            let mut state = self.lock();
            state.total_jobs += 1;
            state.total_savings_usd += savings_usd;
            state.total_co2_saved_g += co2_saved_g;
            state.clone()
        };
        self.persist(&stats);
    }

    /// Record a checkpoint written during a simulated interruption.
    pub fn record_checkpoint(&self) {
        let stats = {
            let mut state = self.lock();
            state.total_checkpoints += 1;
            state.clone()
        };
        self.persist(&stats);
    }

    /// Record a handled spot eviction.
    pub fn record_eviction(&self) {
        let stats = {
            let mut state = self.lock();
            state.total_evictions += 1;
            state.clone()
        };
        self.persist(&stats);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Stats> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Atomic rewrite: temp sibling, then rename. Errors are logged and
    /// swallowed so a full disk never takes the engine down.
    fn persist(&self, stats: &Stats) {
        if let Err(e) = write_atomically(&self.path, stats) {
            tracing::warn!("failed to persist stats to {}: {}", self.path.display(), e);
        }
    }
}

fn write_atomically(path: &Path, stats: &Stats) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(stats)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_zero_fills() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatsStore::load(dir.path().join("stats.json"));
        let stats = store.snapshot();
        assert_eq!(stats.total_jobs, 0);
        assert_eq!(stats.total_savings_usd, 0.0);
    }

    #[test]
    fn test_load_corrupt_file_zero_fills() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = StatsStore::load(&path);
        assert_eq!(store.snapshot().total_jobs, 0);
    }

    #[test]
    fn test_record_job_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        {
            let store = StatsStore::load(&path);
            store.record_job(57.6, 144.0);
            store.record_job(10.0, 6.0);
        }
        let reloaded = StatsStore::load(&path);
        let stats = reloaded.snapshot();
        assert_eq!(stats.total_jobs, 2);
        assert!((stats.total_savings_usd - 67.6).abs() < 1e-9);
        assert!((stats.total_co2_saved_g - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_checkpoint_and_eviction_counters() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatsStore::load(dir.path().join("stats.json"));
        store.record_checkpoint();
        store.record_checkpoint();
        store.record_eviction();
        let stats = store.snapshot();
        assert_eq!(stats.total_checkpoints, 2);
        assert_eq!(stats.total_evictions, 1);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let store = StatsStore::load(&path);
        store.record_job(1.0, 1.0);
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_unwritable_path_keeps_memory_authoritative() {
        // Persisting into a directory that does not exist fails, but the
        // in-memory counters must still advance.
        let store = StatsStore {
            path: PathBuf::from("/nonexistent-dir/sub/stats.json"),
            state: Mutex::new(Stats::default()),
        };
        store.record_job(5.0, 2.0);
        assert_eq!(store.snapshot().total_jobs, 1);
    }
}

use std::sync::Arc;

use crate::cache::LiveCache;
use crate::config::AppConfig;
use crate::events::EventBus;
use crate::services::stats::StatsStore;

pub mod checkpoint;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod region;
pub mod simulate;
pub mod status;
pub mod timeshift;

/// Shared application state for all endpoints.
#[derive(Clone)]
pub struct AppState {
    pub cache: LiveCache,
    pub stats: Arc<StatsStore>,
    pub bus: EventBus,
    pub config: Arc<AppConfig>,
}

#[cfg(test)]
pub(crate) fn test_state() -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = AppState {
        cache: LiveCache::new(),
        stats: Arc::new(StatsStore::load(dir.path().join("stats.json"))),
        bus: EventBus::new(),
        config: Arc::new(AppConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..AppConfig::default()
        }),
    };
    (dir, state)
}

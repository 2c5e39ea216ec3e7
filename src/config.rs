/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Seconds between scrape cycles.
    pub scrape_interval_secs: u64,
    /// Directory holding the stats file and the vision JSON snapshot.
    pub data_dir: String,
    /// Minimum price reduction (percent) before time-shifting is recommended.
    pub timeshift_min_reduction_pct: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            scrape_interval_secs: std::env::var("SCRAPE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("SCRAPE_INTERVAL_SECS must be a valid u64"),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            timeshift_min_reduction_pct: std::env::var("TIMESHIFT_MIN_REDUCTION_PCT")
                .unwrap_or_else(|_| "5.0".to_string())
                .parse()
                .expect("TIMESHIFT_MIN_REDUCTION_PCT must be a valid f64"),
        }
    }

    /// Path of the persisted stats counters file.
    pub fn stats_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("nerve_stats.json")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            scrape_interval_secs: 60,
            data_dir: "./data".to_string(),
            timeshift_min_reduction_pct: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        // NOTE: set_var/remove_var in tests is unsafe in multi-threaded contexts
        // (Rust may run tests in parallel). This test only exercises default-value
        // logic; cargo runs this module's tests sequentially within one binary.
        unsafe {
            std::env::remove_var("PORT");
            std::env::remove_var("SCRAPE_INTERVAL_SECS");
            std::env::remove_var("DATA_DIR");
            std::env::remove_var("TIMESHIFT_MIN_REDUCTION_PCT");
        }

        let config = AppConfig::from_env();

        assert_eq!(config.port, 8080);
        assert_eq!(config.scrape_interval_secs, 60);
        assert_eq!(config.data_dir, "./data");
        assert_eq!(config.timeshift_min_reduction_pct, 5.0);
    }

    #[test]
    fn test_stats_path_under_data_dir() {
        let config = AppConfig {
            data_dir: "/tmp/nerve".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(
            config.stats_path(),
            std::path::PathBuf::from("/tmp/nerve/nerve_stats.json")
        );
    }
}

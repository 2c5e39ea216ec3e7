//! In-memory live observation cache.
//!
//! Single writer (the scrape loop), many readers (request handlers). The
//! per-region {prices, weather, carbon} triple is replaced inside one write
//! lock, so a reader sees either the whole old record or the whole new one,
//! never a mix. Readers receive cloned snapshots of the small per-region
//! records; there is no ordering guarantee across two reads.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::models::{CarbonObservation, PriceHistoryEntry, SpotObservation, WeatherObservation};

/// Price-history ring capacity per region: 24h at one scrape per minute.
pub const MAX_HISTORY_POINTS: usize = 1_440;

/// Recent error strings retained for the status endpoint.
const MAX_ERRORS: usize = 10;

#[derive(Debug, Default)]
struct CacheState {
    last_scrape: Option<DateTime<Utc>>,
    scrape_count: u64,
    prices: HashMap<String, Vec<SpotObservation>>,
    weather: HashMap<String, WeatherObservation>,
    carbon: HashMap<String, CarbonObservation>,
    price_history: HashMap<String, VecDeque<PriceHistoryEntry>>,
    errors: VecDeque<String>,
}

/// Shared handle to the live cache.
#[derive(Debug, Clone, Default)]
pub struct LiveCache {
    state: Arc<RwLock<CacheState>>,
}

/// Scraper status snapshot, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScraperStatus {
    pub last_scrape: Option<DateTime<Utc>>,
    pub scrape_count: u64,
    pub total_gpus: usize,
    pub regions: Vec<String>,
    /// Price-history ring length per region
    pub price_history_points: HashMap<String, usize>,
    /// Most recent error strings (bounded)
    pub errors: Vec<String>,
}

impl LiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the per-region record in one atomic write. `None` fields keep
    /// the prior value (stale data beats no data on fetch failure).
    ///
    /// Returns the previous price observations for change detection.
    pub async fn replace_region(
        &self,
        region_id: &str,
        prices: Option<Vec<SpotObservation>>,
        weather: Option<WeatherObservation>,
        carbon: Option<CarbonObservation>,
    ) -> Vec<SpotObservation> {
        let mut state = self.state.write().await;
        let old_prices = state.prices.get(region_id).cloned().unwrap_or_default();
        if let Some(prices) = prices {
            state.prices.insert(region_id.to_string(), prices);
        }
        if let Some(weather) = weather {
            state.weather.insert(region_id.to_string(), weather);
        }
        if let Some(carbon) = carbon {
            state.carbon.insert(region_id.to_string(), carbon);
        }
        old_prices
    }

    pub async fn region_prices(&self, region_id: &str) -> Vec<SpotObservation> {
        self.state
            .read()
            .await
            .prices
            .get(region_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn region_weather(&self, region_id: &str) -> Option<WeatherObservation> {
        self.state.read().await.weather.get(region_id).cloned()
    }

    pub async fn region_carbon(&self, region_id: &str) -> Option<CarbonObservation> {
        self.state.read().await.carbon.get(region_id).cloned()
    }

    /// Append a price-history entry, evicting the oldest past the cap.
    pub async fn push_history(&self, region_id: &str, entry: PriceHistoryEntry) {
        let mut state = self.state.write().await;
        let ring = state.price_history.entry(region_id.to_string()).or_default();
        ring.push_back(entry);
        while ring.len() > MAX_HISTORY_POINTS {
            ring.pop_front();
        }
    }

    pub async fn price_history(&self, region_id: &str) -> Vec<PriceHistoryEntry> {
        self.state
            .read()
            .await
            .price_history
            .get(region_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record a fetch error (bounded ring; oldest evicted).
    pub async fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("scrape error: {}", message);
        let mut state = self.state.write().await;
        state.errors.push_back(message);
        while state.errors.len() > MAX_ERRORS {
            state.errors.pop_front();
        }
    }

    /// Clear the error log at the start of a scrape cycle.
    pub async fn clear_errors(&self) {
        self.state.write().await.errors.clear();
    }

    /// Bump the scrape counter and timestamp at the end of a cycle.
    pub async fn mark_scraped(&self) -> u64 {
        let mut state = self.state.write().await;
        state.scrape_count += 1;
        state.last_scrape = Some(Utc::now());
        state.scrape_count
    }

    pub async fn status(&self) -> ScraperStatus {
        let state = self.state.read().await;
        ScraperStatus {
            last_scrape: state.last_scrape,
            scrape_count: state.scrape_count,
            total_gpus: state.prices.values().map(Vec::len).sum(),
            regions: state.prices.keys().cloned().collect(),
            price_history_points: state
                .price_history
                .iter()
                .map(|(region, ring)| (region.clone(), ring.len()))
                .collect(),
            errors: state.errors.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, GpuTier};

    fn observation(sku: &str, spot: f64) -> SpotObservation {
        SpotObservation {
            sku: sku.to_string(),
            gpu_name: "Tesla V100 (16GB)".to_string(),
            gpu_count: 1,
            vcpus: 6,
            ram_gb: 112,
            tier: GpuTier::High,
            spot_price_usd_hr: spot,
            ondemand_price_usd_hr: spot * 5.0,
            savings_pct: 80.0,
            availability: Availability::High,
            scraped_at: Utc::now(),
        }
    }

    fn history_entry(hour: u32) -> PriceHistoryEntry {
        PriceHistoryEntry {
            timestamp: Utc::now(),
            hour,
            avg_spot: 1.0,
            min_spot: 0.5,
            max_spot: 2.0,
            avg_compute_spot: 1.1,
            gpu_count: 3,
        }
    }

    #[tokio::test]
    async fn test_replace_region_returns_old_prices() {
        let cache = LiveCache::new();
        let old = cache
            .replace_region("francecentral", Some(vec![observation("a", 1.0)]), None, None)
            .await;
        assert!(old.is_empty());

        let old = cache
            .replace_region("francecentral", Some(vec![observation("a", 2.0)]), None, None)
            .await;
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].spot_price_usd_hr, 1.0);
    }

    #[tokio::test]
    async fn test_none_fields_keep_prior_value() {
        let cache = LiveCache::new();
        cache
            .replace_region("francecentral", Some(vec![observation("a", 1.0)]), None, None)
            .await;
        // Failed fetch: prices None must retain the stale observation.
        cache.replace_region("francecentral", None, None, None).await;
        assert_eq!(cache.region_prices("francecentral").await.len(), 1);
    }

    #[tokio::test]
    async fn test_history_ring_is_bounded() {
        let cache = LiveCache::new();
        let n = MAX_HISTORY_POINTS + 25;
        for i in 0..n {
            cache
                .push_history("francecentral", history_entry((i % 24) as u32))
                .await;
        }
        let history = cache.price_history("francecentral").await;
        assert_eq!(history.len(), MAX_HISTORY_POINTS);
        // Oldest entries evicted: the first retained entry is entry #25.
        assert_eq!(history[0].hour, (25 % 24) as u32);
    }

    #[tokio::test]
    async fn test_history_below_cap_keeps_all() {
        let cache = LiveCache::new();
        for i in 0..10 {
            cache.push_history("westeurope", history_entry(i)).await;
        }
        assert_eq!(cache.price_history("westeurope").await.len(), 10);
    }

    #[tokio::test]
    async fn test_error_log_keeps_last_ten() {
        let cache = LiveCache::new();
        for i in 0..15 {
            cache.record_error(format!("error {}", i)).await;
        }
        let status = cache.status().await;
        assert_eq!(status.errors.len(), 10);
        assert_eq!(status.errors[0], "error 5");
        assert_eq!(status.errors[9], "error 14");
    }

    #[tokio::test]
    async fn test_mark_scraped_increments() {
        let cache = LiveCache::new();
        assert_eq!(cache.mark_scraped().await, 1);
        assert_eq!(cache.mark_scraped().await, 2);
        let status = cache.status().await;
        assert_eq!(status.scrape_count, 2);
        assert!(status.last_scrape.is_some());
    }

    #[tokio::test]
    async fn test_status_counts_gpus_across_regions() {
        let cache = LiveCache::new();
        cache
            .replace_region(
                "francecentral",
                Some(vec![observation("a", 1.0), observation("b", 2.0)]),
                None,
                None,
            )
            .await;
        cache
            .replace_region("westeurope", Some(vec![observation("c", 3.0)]), None, None)
            .await;
        let status = cache.status().await;
        assert_eq!(status.total_gpus, 3);
        assert_eq!(status.regions.len(), 2);
    }
}

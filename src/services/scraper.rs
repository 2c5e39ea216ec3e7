//! Background scrape loop.
//!
//! Architecture:
//! - One immediate scrape at startup, then a fixed-interval loop (60s).
//! - Per region, the Azure price fetch, the weather fetch and the live UK
//!   carbon fetch run concurrently; non-UK carbon is computed from the
//!   freshest weather available.
//! - The per-region {prices, weather, carbon} triple is written atomically;
//!   failed fetches retain the stale prior value.
//! - Price changes between cycles emit `az_price_update` events; every cycle
//!   appends one price-history entry per region with fresh data.
//! - A cycle never fails: all errors land in the cache's bounded error log.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio::task::JoinHandle;

use crate::cache::LiveCache;
use crate::catalog::{self, Region};
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::events::{EventBus, EventType, PriceUpdatePayload};
use crate::helpers::round6;
use crate::models::{CarbonObservation, PriceHistoryEntry, SpotObservation, WeatherObservation};
use crate::services::azure::AzureClient;
use crate::services::carbon::{self, CarbonClient};
use crate::services::meteo::MeteoClient;
use crate::services::vision;

/// The background scraper and its collaborators.
pub struct Scraper {
    cache: LiveCache,
    bus: EventBus,
    azure: AzureClient,
    meteo: MeteoClient,
    carbon: CarbonClient,
    interval: Duration,
    data_dir: PathBuf,
}

/// Handle to the running scrape loop with an explicit stop.
pub struct ScraperTask {
    handle: JoinHandle<()>,
}

impl ScraperTask {
    /// Cancel the loop. In-flight fetches are dropped; the cache keeps
    /// whatever the last completed cycle wrote.
    pub fn shutdown(self) {
        self.handle.abort();
        tracing::info!("Scraper stopped");
    }
}

impl Scraper {
    pub fn new(cache: LiveCache, bus: EventBus, config: &AppConfig) -> Self {
        Self {
            cache,
            bus,
            azure: AzureClient::new(),
            meteo: MeteoClient::new(),
            carbon: CarbonClient::new(),
            interval: Duration::from_secs(config.scrape_interval_secs),
            data_dir: PathBuf::from(&config.data_dir),
        }
    }

    /// Spawn the loop: one immediate scrape, then one per interval.
    pub fn spawn(self) -> ScraperTask {
        let handle = tokio::spawn(self.run());
        ScraperTask { handle }
    }

    async fn run(self) {
        tracing::info!(
            "Live scraper started (interval {}s, {} regions)",
            self.interval.as_secs(),
            catalog::REGIONS.len()
        );
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately; the first scrape runs now.
        ticker.tick().await;
        loop {
            self.scrape_cycle().await;
            ticker.tick().await;
        }
    }

    /// One full scrape cycle across all regions. Never fails.
    pub async fn scrape_cycle(&self) {
        self.cache.clear_errors().await;

        for region in catalog::REGIONS {
            self.scrape_region(region).await;
        }

        let count = self.cache.mark_scraped().await;
        let status = self.cache.status().await;
        tracing::info!(
            "Scrape #{} complete: {} GPUs across {} regions",
            count,
            status.total_gpus,
            catalog::REGIONS.len()
        );

        if let Err(e) = vision::export_snapshot(&self.cache, &self.data_dir).await {
            tracing::warn!("vision JSON export failed: {}", e);
        }
    }

    async fn scrape_region(&self, region: &'static Region) {
        let (price_outcome, weather_result, live_carbon) = tokio::join!(
            self.azure.fetch_region_prices(region.id),
            self.meteo.fetch(region),
            self.fetch_live_carbon(region),
        );

        for error in &price_outcome.errors {
            self.cache.record_error(error.clone()).await;
        }

        let fresh_weather = match weather_result {
            Ok(weather) => {
                tracing::info!(
                    "Weather {}: {}C, {} km/h wind",
                    region.id,
                    weather.current_temp_c,
                    weather.current_wind_kmh
                );
                Some(weather)
            }
            Err(e) => {
                self.cache
                    .record_error(format!("Weather {}: {}", region.id, e))
                    .await;
                None
            }
        };

        // Carbon is computed before the write so the whole per-region triple
        // lands in one atomic replacement.
        let prev_weather = self.cache.region_weather(region.id).await;
        let prev_carbon = self.cache.region_carbon(region.id).await;
        let (carbon_obs, carbon_error) = resolve_carbon(
            region,
            fresh_weather.as_ref().or(prev_weather.as_ref()),
            live_carbon,
            prev_carbon,
        );
        if let Some(error) = carbon_error {
            self.cache.record_error(error).await;
        }

        // An empty result with errors means the fetch failed outright:
        // retain the stale observations instead of wiping the region.
        let fresh_prices = if price_outcome.observations.is_empty()
            && !price_outcome.errors.is_empty()
        {
            None
        } else {
            Some(price_outcome.observations)
        };

        let old_prices = self
            .cache
            .replace_region(
                region.id,
                fresh_prices.clone(),
                fresh_weather,
                Some(carbon_obs),
            )
            .await;

        if let Some(new_prices) = fresh_prices {
            detect_price_changes(region, &old_prices, &new_prices, &self.bus);
            if let Some(entry) = history_entry(&new_prices, Utc::now()) {
                self.cache.push_history(region.id, entry).await;
            }
        }
    }

    /// Only the UK region has a live intensity feed.
    async fn fetch_live_carbon(
        &self,
        region: &Region,
    ) -> Option<Result<CarbonObservation, AppError>> {
        if region.id == catalog::LIVE_CARBON_REGION {
            Some(self.carbon.fetch_uk().await)
        } else {
            None
        }
    }
}

/// Weather fallbacks for the carbon model when no snapshot exists yet.
const MODEL_DEFAULT_WIND_KMH: f64 = 15.0;
const MODEL_DEFAULT_SOLAR_WM2: f64 = 0.0;

/// Pick the carbon observation for this cycle.
///
/// Live-feed regions use the fetched value, falling back to the previous
/// observation (then the model default) on failure. Other regions run the
/// weather model on the freshest snapshot available.
pub(crate) fn resolve_carbon(
    region: &Region,
    weather: Option<&WeatherObservation>,
    live: Option<Result<CarbonObservation, AppError>>,
    prev: Option<CarbonObservation>,
) -> (CarbonObservation, Option<String>) {
    if let Some(result) = live {
        return match result {
            Ok(obs) => {
                tracing::info!("Carbon {}: {} gCO2/kWh ({})", region.id, obs.gco2_kwh, obs.index);
                (obs, None)
            }
            Err(e) => {
                let error = format!("Carbon {}: {}", region.id, e);
                let fallback = prev.unwrap_or_else(|| {
                    carbon::estimate_from_weather(region.id, MODEL_DEFAULT_WIND_KMH, MODEL_DEFAULT_SOLAR_WM2)
                });
                (fallback, Some(error))
            }
        };
    }

    let wind = weather
        .map(|w| w.current_wind_kmh)
        .unwrap_or(MODEL_DEFAULT_WIND_KMH);
    let solar = weather
        .map(|w| w.current_solar_wm2)
        .unwrap_or(MODEL_DEFAULT_SOLAR_WM2);
    let obs = carbon::estimate_from_weather(region.id, wind, solar);
    tracing::info!(
        "Carbon {}: {} gCO2/kWh ({}) from model (wind={:.0}km/h, solar={:.0}W/m2)",
        region.id,
        obs.gco2_kwh,
        obs.index,
        wind,
        solar
    );
    (obs, None)
}

/// Detect per-SKU spot price movements and emit `az_price_update` events.
pub(crate) fn detect_price_changes(
    region: &Region,
    old: &[SpotObservation],
    new: &[SpotObservation],
    bus: &EventBus,
) {
    let old_prices: HashMap<&str, f64> = old
        .iter()
        .map(|obs| (obs.sku.as_str(), obs.spot_price_usd_hr))
        .collect();

    for obs in new {
        let Some(&old_price) = old_prices.get(obs.sku.as_str()) else {
            continue;
        };
        if old_price != obs.spot_price_usd_hr {
            bus.emit(
                EventType::AzPriceUpdate,
                &PriceUpdatePayload {
                    region: region.id.to_string(),
                    az: region.azs[0].id.to_string(),
                    sku: obs.sku.clone(),
                    gpu_name: obs.gpu_name.clone(),
                    old_price,
                    new_price: obs.spot_price_usd_hr,
                    currency: "USD",
                },
            );
        }
    }
}

/// Aggregate one region's observations into a price-history entry.
///
/// The compute average covers NC/ND SKUs only (training-grade GPUs); when a
/// region carries none it falls back to the overall average.
pub(crate) fn history_entry(
    observations: &[SpotObservation],
    now: DateTime<Utc>,
) -> Option<PriceHistoryEntry> {
    if observations.is_empty() {
        return None;
    }

    let prices: Vec<f64> = observations.iter().map(|o| o.spot_price_usd_hr).collect();
    let compute_prices: Vec<f64> = observations
        .iter()
        .filter(|o| o.sku.starts_with("Standard_NC") || o.sku.starts_with("Standard_ND"))
        .map(|o| o.spot_price_usd_hr)
        .collect();
    let compute_prices = if compute_prices.is_empty() {
        &prices
    } else {
        &compute_prices
    };

    let avg = prices.iter().sum::<f64>() / prices.len() as f64;
    let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg_compute = compute_prices.iter().sum::<f64>() / compute_prices.len() as f64;

    Some(PriceHistoryEntry {
        timestamp: now,
        hour: now.hour(),
        avg_spot: round6(avg),
        min_spot: round6(min),
        max_spot: round6(max),
        avg_compute_spot: round6(avg_compute),
        gpu_count: observations.len(),
    })
}

//! Vision JSON export: a complete machine-readable snapshot of the live
//! market view, regenerated after every scrape cycle.
//!
//! The document carries all regions with per-AZ GPU prices, hourly weather,
//! carbon intensity, the scoring weights and the reference price constants.

use std::path::{Path, PathBuf};

use chrono::{Timelike, Utc};
use serde_json::json;

use crate::cache::LiveCache;
use crate::catalog;
use crate::errors::AppError;
use crate::helpers::round4;
use crate::models::{CarbonObservation, WeatherObservation};
use crate::services::market;

/// Schema version stamped into the exported document.
pub const VISION_SCHEMA_VERSION: &str = "2.0";

/// File name of the snapshot inside the data directory.
const VISION_FILE_NAME: &str = "nerve_scraped_data.json";

/// Render and write the vision snapshot. Returns the written path.
pub async fn export_snapshot(cache: &LiveCache, data_dir: &Path) -> Result<PathBuf, AppError> {
    let status = cache.status().await;
    let now = Utc::now();
    let hour = now.hour();

    let mut regions_data = serde_json::Map::new();
    for region in catalog::REGIONS {
        let prices = cache.region_prices(region.id).await;
        let weather = cache.region_weather(region.id).await;
        let carbon = cache.region_carbon(region.id).await;

        let mut az_zones = serde_json::Map::new();
        for az in region.azs {
            let instances = market::project_az_instances(&prices, az.id, hour);
            let gpu_spot_prices: Vec<serde_json::Value> = instances
                .iter()
                .map(|inst| {
                    json!({
                        "sku": inst.sku,
                        "gpu": inst.gpu_name,
                        "gpu_count": inst.gpu_count,
                        "vcpus": inst.vcpus,
                        "ram_gb": inst.ram_gb,
                        "spot_price_usd_hr": round4(inst.spot_price_usd_hr),
                        "ondemand_price_usd_hr": round4(inst.ondemand_price_usd_hr),
                        "savings_pct": inst.savings_pct,
                        "availability": inst.availability,
                    })
                })
                .collect();
            az_zones.insert(
                az.id.to_string(),
                json!({
                    "name": az.name,
                    "gpu_spot_prices": gpu_spot_prices,
                }),
            );
        }

        regions_data.insert(
            region.id.to_string(),
            json!({
                "cloud_provider": region.cloud_provider,
                "location": region.location,
                "coordinates": {"lat": region.lat, "lng": region.lon},
                "availability_zones": az_zones,
                "weather": weather_block(weather.as_ref()),
                "carbon_intensity": carbon_block(carbon.as_ref()),
            }),
        );
    }

    let vision = json!({
        "metadata": {
            "scrape_timestamp": now.to_rfc3339(),
            "version": VISION_SCHEMA_VERSION,
            "scrape_count": status.scrape_count,
            "sources": [
                "Azure Retail Prices API (LIVE)",
                "Open-Meteo API (LIVE)",
                "Carbon Intensity UK API (LIVE)",
                "NERVE physics-based carbon model (FR/NL)",
            ],
            "target_regions": catalog::REGIONS.iter().map(|r| r.id).collect::<Vec<_>>(),
        },
        "job_context": {
            "job_type": "llm_fine_tuning",
            "model": "LLaMA-7B",
            "estimated_gpu_hours": 24,
            "checkpoint_interval_min": 30,
            "min_gpu_memory_gb": 16,
            "framework": "pytorch",
        },
        "regions": regions_data,
        "scoring_weights": {
            "w_price": 0.50,
            "w_carbon": 0.20,
            "w_availability": 0.15,
            "w_cooling": 0.10,
            "w_renewable": 0.05,
            "formula": "score = w_price * norm_spot + w_carbon * norm_carbon \
                        + w_availability * (1-avail) + w_cooling * norm_cooling \
                        + w_renewable * (1-renew)",
        },
        "reference_prices": {
            "currency_eur_usd": catalog::EUR_USD,
            "avg_datacenter_pue": catalog::DATACENTER_PUE,
            "kwh_per_gpu_hour": catalog::KWH_PER_GPU_FAMILY
                .iter()
                .map(|(family, kwh)| (family.to_string(), json!(kwh)))
                .collect::<serde_json::Map<_, _>>(),
        },
    });

    let rendered = serde_json::to_string_pretty(&vision)
        .map_err(|e| AppError::InternalError(format!("vision JSON render failed: {}", e)))?;

    tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
        AppError::InternalError(format!("failed to create {}: {}", data_dir.display(), e))
    })?;
    let path = data_dir.join(VISION_FILE_NAME);
    tokio::fs::write(&path, rendered).await.map_err(|e| {
        AppError::InternalError(format!("failed to write {}: {}", path.display(), e))
    })?;

    tracing::debug!("vision JSON exported to {}", path.display());
    Ok(path)
}

fn weather_block(weather: Option<&WeatherObservation>) -> serde_json::Value {
    let temp = weather.map(|w| w.current_temp_c).unwrap_or(10.0);
    let wind = weather.map(|w| w.current_wind_kmh).unwrap_or(15.0);
    let solar = weather.map(|w| w.current_solar_wm2).unwrap_or(0.0);

    let hourly_forecast: Vec<serde_json::Value> = weather
        .map(|w| {
            w.hourly
                .iter()
                .map(|row| {
                    json!({
                        "hour": row.hour,
                        "temp_c": row.temp_c,
                        "wind_kmh": row.wind_kmh,
                        "solar_radiation_wm2": row.solar_wm2,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let cooling = if temp < 10.0 {
        "good"
    } else if temp < 18.0 {
        "moderate"
    } else {
        "poor"
    };

    let wind_note = if wind > 20.0 {
        format!("high wind ({:.0} km/h)", wind)
    } else if wind > 10.0 {
        format!("moderate wind ({:.0} km/h)", wind)
    } else {
        format!("low wind ({:.0} km/h)", wind)
    };
    let solar_note = if solar > 200.0 {
        format!("high solar ({:.0} W/m2)", solar)
    } else if solar > 50.0 {
        format!("moderate solar ({:.0} W/m2)", solar)
    } else {
        format!("low solar ({:.0} W/m2)", solar)
    };

    json!({
        "source": "open-meteo.com (LIVE)",
        "current_temp_c": temp,
        "current_wind_kmh": wind,
        "current_solar_wm2": solar,
        "hourly_forecast": hourly_forecast,
        "cooling_advantage": format!("{} - {:.1}C", cooling, temp),
        "renewable_potential": format!("{}, {}", wind_note, solar_note),
    })
}

fn carbon_block(carbon: Option<&CarbonObservation>) -> serde_json::Value {
    json!({
        "source": carbon.map(|c| c.source.clone()).unwrap_or_else(|| "unknown".to_string()),
        "current_gco2_kwh": carbon.map(|c| c.gco2_kwh).unwrap_or(100.0),
        "index": carbon.map(|c| c.index.to_string()).unwrap_or_else(|| "moderate".to_string()),
    })
}

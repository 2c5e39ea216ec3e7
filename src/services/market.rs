//! Spot-market modelling: availability tiers, deterministic per-AZ price
//! variation, and projection of region-level observations onto individual
//! availability zones.
//!
//! The per-AZ variations are keyed on MD5 digests so that every process on
//! every platform derives byte-identical prices for the same
//! (az, sku, hour) tuple. MD5 is used for distribution, not security.

use md5::{Digest, Md5};

use crate::catalog::Region;
use crate::helpers::{round1, round6};
use crate::models::{
    Availability, AzInfo, CarbonIndex, CarbonObservation, GpuInstance, GpuTier, RegionInfo,
    SpotObservation, WeatherObservation,
};

/// Spot/on-demand ratio above which capacity is considered scarce.
const RATIO_LOW_AVAILABILITY: f64 = 0.70;
/// Spot/on-demand ratio above which capacity is considered moderate.
const RATIO_MEDIUM_AVAILABILITY: f64 = 0.45;

/// Defaults used when a region has no live weather or carbon yet.
const DEFAULT_TEMP_C: f64 = 10.0;
const DEFAULT_WIND_KMH: f64 = 15.0;
const DEFAULT_GCO2_KWH: f64 = 56.0;

/// Estimate spot availability from the spot/on-demand price ratio.
///
/// A spot price close to on-demand signals contention (scarce capacity); a
/// deep discount signals plenty. Without a usable on-demand price the GPU
/// tier provides a coarse default.
pub fn availability_from_ratio(
    spot: f64,
    ondemand: f64,
    tier: GpuTier,
    price: f64,
) -> Availability {
    if ondemand > 0.0 && spot > 0.0 {
        let ratio = spot / ondemand;
        if ratio > RATIO_LOW_AVAILABILITY {
            return Availability::Low;
        }
        if ratio > RATIO_MEDIUM_AVAILABILITY {
            return Availability::Medium;
        }
        return Availability::High;
    }

    match tier {
        GpuTier::Premium | GpuTier::Ultra => Availability::Low,
        GpuTier::High => {
            if price > 2.0 {
                Availability::Medium
            } else {
                Availability::High
            }
        }
        GpuTier::Mid | GpuTier::Low => Availability::High,
    }
}

/// Deterministic per-AZ spot price micro-variation.
///
/// Key = MD5(az_id ":" sku ":" hour_of_day_utc); the first 8 hex chars,
/// parsed big-endian as u32, map onto [-1, 1] and scale the price by up to
/// roughly +/-5% (8% at the extremes). Result rounded to 6 dp.
pub fn az_price_variation(base_price: f64, az_id: &str, sku: &str, hour: u32) -> f64 {
    let key = format!("{}:{}:{}", az_id, sku, hour);
    let digest = Md5::digest(key.as_bytes());
    let seed = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let val = (seed as f64 / u32::MAX as f64) * 2.0 - 1.0;
    let variation_pct = val * 0.05;
    round6(base_price * (1.0 + variation_pct))
}

/// Deterministic per-AZ availability shift: roughly 30% of AZs run hotter
/// than their region and lose one availability step.
///
/// Key = MD5(az_id ":load"); first 4 hex chars mod 10 below 3 downgrades.
pub fn az_availability_shift(base: Availability, az_id: &str) -> Availability {
    let key = format!("{}:load", az_id);
    let digest = Md5::digest(key.as_bytes());
    let load_val = u16::from_be_bytes([digest[0], digest[1]]) % 10;
    if load_val < 3 {
        base.downgraded()
    } else {
        base
    }
}

/// Project region-level observations onto per-AZ instances for one AZ.
pub fn project_az_instances(
    observations: &[SpotObservation],
    az_id: &str,
    hour: u32,
) -> Vec<GpuInstance> {
    observations
        .iter()
        .map(|obs| {
            let az_spot = az_price_variation(obs.spot_price_usd_hr, az_id, &obs.sku, hour);
            // On-demand pricing is uniform across AZs within a region.
            let az_ondemand = obs.ondemand_price_usd_hr;
            let az_savings = if az_ondemand > 0.0 {
                round1((1.0 - az_spot / az_ondemand) * 100.0)
            } else {
                obs.savings_pct
            };
            let base_avail = availability_from_ratio(az_spot, az_ondemand, obs.tier, az_spot);
            let az_avail = az_availability_shift(base_avail, az_id);

            GpuInstance {
                sku: obs.sku.clone(),
                gpu_name: obs.gpu_name.clone(),
                gpu_count: obs.gpu_count,
                vcpus: obs.vcpus,
                ram_gb: obs.ram_gb,
                spot_price_usd_hr: az_spot,
                ondemand_price_usd_hr: az_ondemand,
                savings_pct: az_savings,
                availability: az_avail,
            }
        })
        .collect()
}

/// Build the full `RegionInfo` view from cached observations.
///
/// Each AZ gets its own jittered instance prices and a slight micro-climate
/// offset on temperature and wind; carbon is inherited region-wide.
pub fn project_region(
    region: &Region,
    observations: &[SpotObservation],
    weather: Option<&WeatherObservation>,
    carbon: Option<&CarbonObservation>,
    hour: u32,
) -> RegionInfo {
    let base_temp = weather.map(|w| w.current_temp_c).unwrap_or(DEFAULT_TEMP_C);
    let base_wind = weather.map(|w| w.current_wind_kmh).unwrap_or(DEFAULT_WIND_KMH);
    let gco2 = carbon.map(|c| c.gco2_kwh).unwrap_or(DEFAULT_GCO2_KWH);
    let index = carbon.map(|c| c.index).unwrap_or(CarbonIndex::Low);

    let availability_zones = region
        .azs
        .iter()
        .enumerate()
        .map(|(i, az)| {
            let gpu_instances = project_az_instances(observations, az.id, hour);
            AzInfo {
                az_id: az.id.to_string(),
                az_name: az.name.to_string(),
                gpu_instances,
                carbon_intensity_gco2_kwh: gco2,
                carbon_index: index,
                temperature_c: round1(base_temp + (i as f64 * 0.2 - 0.2)),
                wind_kmh: round1(base_wind + (i as f64 * 0.5 - 0.5)),
                score: None,
            }
        })
        .collect();

    RegionInfo {
        region_id: region.id.to_string(),
        region_name: region.name.to_string(),
        cloud_provider: region.cloud_provider.to_string(),
        location: region.location.to_string(),
        availability_zones,
    }
}

//! Grid carbon intensity: live UK API client plus the physics-based model
//! used for regions without a live feed.
//!
//! The model scales each region's installed wind/solar potential by live
//! weather, lets gas fill the residual demand, and sums the per-source
//! emission factors. High wind or strong sun displaces gas, so the computed
//! intensity drops in real time.

use serde::Deserialize;

use crate::catalog::{self, GridMix};
use crate::errors::AppError;
use crate::helpers::round1;
use crate::models::{CarbonIndex, CarbonObservation};

const CARBON_INTENSITY_UK_URL: &str = "https://api.carbonintensity.org.uk/intensity";

/// HTTP request timeout for the carbon intensity API (seconds).
const CARBON_HTTP_TIMEOUT_SECS: u64 = 10;

/// Intensity assumed when the live API returns neither actual nor forecast.
const UK_FALLBACK_GCO2: f64 = 120.0;

/// Intensity used for regions with neither a live feed nor a grid mix.
pub const DEFAULT_GCO2: f64 = 100.0;

/// Wind speed (km/h) below which turbines produce nothing.
const WIND_CUT_IN_KMH: f64 = 5.0;
/// Wind speed span (km/h) over which output ramps from zero to rated.
const WIND_RAMP_KMH: f64 = 40.0;
/// Direct radiation (W/m2) at which solar output reaches rated capacity.
const SOLAR_RATED_WM2: f64 = 800.0;

// ---------------------------------------------------------------------------
// Live UK API
// ---------------------------------------------------------------------------

/// Client for api.carbonintensity.org.uk.
#[derive(Debug, Clone)]
pub struct CarbonClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IntensityResponse {
    #[serde(default)]
    data: Vec<IntensityEntry>,
}

#[derive(Debug, Deserialize)]
struct IntensityEntry {
    from: Option<String>,
    to: Option<String>,
    #[serde(default)]
    intensity: IntensityBlock,
}

#[derive(Debug, Default, Deserialize)]
struct IntensityBlock {
    actual: Option<f64>,
    forecast: Option<f64>,
    index: Option<String>,
}

impl CarbonClient {
    pub fn new() -> Self {
        Self::with_base_url(CARBON_INTENSITY_UK_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(CARBON_HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    /// Fetch the current GB grid intensity from the live API.
    pub async fn fetch_uk(&self) -> Result<CarbonObservation, AppError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("carbonintensity request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "carbonintensity returned HTTP {}",
                response.status()
            )));
        }

        let body: IntensityResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("carbonintensity JSON parse error: {}", e))
        })?;

        Ok(parse_uk_observation(body))
    }
}

impl Default for CarbonClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_uk_observation(body: IntensityResponse) -> CarbonObservation {
    let entry = body.data.into_iter().next().unwrap_or(IntensityEntry {
        from: None,
        to: None,
        intensity: IntensityBlock::default(),
    });
    let gco2 = entry
        .intensity
        .actual
        .or(entry.intensity.forecast)
        .unwrap_or(UK_FALLBACK_GCO2);
    let index = entry
        .intensity
        .index
        .as_deref()
        .map(parse_api_index)
        .unwrap_or(CarbonIndex::Low);

    CarbonObservation {
        gco2_kwh: gco2,
        index,
        source: "carbonintensity.org.uk (LIVE)".to_string(),
        valid_from: entry.from,
        valid_to: entry.to,
    }
}

/// Parse the API's categorical index, defaulting to "low" on anything odd.
fn parse_api_index(s: &str) -> CarbonIndex {
    match s {
        "very low" => CarbonIndex::VeryLow,
        "moderate" => CarbonIndex::Moderate,
        "high" => CarbonIndex::High,
        "very high" => CarbonIndex::VeryHigh,
        _ => CarbonIndex::Low,
    }
}

// ---------------------------------------------------------------------------
// Physics-based model
// ---------------------------------------------------------------------------

/// Band a model-computed intensity into a categorical index.
pub fn index_for_gco2(gco2: f64) -> CarbonIndex {
    if gco2 < 80.0 {
        CarbonIndex::VeryLow
    } else if gco2 < 150.0 {
        CarbonIndex::Low
    } else if gco2 < 250.0 {
        CarbonIndex::Moderate
    } else if gco2 < 400.0 {
        CarbonIndex::High
    } else {
        CarbonIndex::VeryHigh
    }
}

/// Estimate grid carbon intensity from live weather.
///
/// Wind capacity factor ramps over (5, 45) km/h; solar reaches rated output
/// at 800 W/m2. Nuclear, hydro and coal are fixed shares; gas fills the
/// remainder but never drops below half its configured base share. Regions
/// without a configured mix get a flat default.
pub fn estimate_from_weather(region_id: &str, wind_kmh: f64, solar_wm2: f64) -> CarbonObservation {
    let Some(mix) = catalog::grid_mix(region_id) else {
        return CarbonObservation {
            gco2_kwh: DEFAULT_GCO2,
            index: CarbonIndex::Low,
            source: "default".to_string(),
            valid_from: None,
            valid_to: None,
        };
    };

    let gco2 = round1(weighted_intensity(mix, wind_kmh, solar_wm2));

    CarbonObservation {
        gco2_kwh: gco2,
        index: index_for_gco2(gco2),
        source: format!(
            "NERVE weather-based model (wind={:.0}km/h, solar={:.0}W/m2)",
            wind_kmh, solar_wm2
        ),
        valid_from: None,
        valid_to: None,
    }
}

fn weighted_intensity(mix: &GridMix, wind_kmh: f64, solar_wm2: f64) -> f64 {
    let wind_cf = ((wind_kmh - WIND_CUT_IN_KMH) / WIND_RAMP_KMH).clamp(0.0, 1.0);
    let wind_share = mix.wind_max * wind_cf;

    let solar_cf = (solar_wm2 / SOLAR_RATED_WM2).clamp(0.0, 1.0);
    let solar_share = mix.solar_max * solar_cf;

    let nuclear_share = mix.nuclear;
    let hydro_share = mix.hydro;
    let coal_share = mix.coal_base;

    // Gas fills whatever clean generation leaves uncovered.
    let total_clean = nuclear_share + hydro_share + wind_share + solar_share;
    let gas_share = (1.0 - total_clean - coal_share).max(mix.gas_base * 0.5);

    nuclear_share * catalog::emission_factor("nuclear")
        + hydro_share * catalog::emission_factor("hydro")
        + wind_share * catalog::emission_factor("wind")
        + solar_share * catalog::emission_factor("solar")
        + gas_share * catalog::emission_factor("gas")
        + coal_share * catalog::emission_factor("coal")
}

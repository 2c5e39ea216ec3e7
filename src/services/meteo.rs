//! Open-Meteo forecast client.
//!
//! Fetches hourly temperature, wind speed and direct radiation for a region's
//! coordinates, one day ahead, in the region's timezone. The scraper treats
//! the row at the current UTC hour as "now".

use chrono::{Timelike, Utc};
use serde::Deserialize;

use crate::catalog::Region;
use crate::errors::AppError;
use crate::models::{HourlyWeather, WeatherObservation};

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// HTTP request timeout for Open-Meteo calls (seconds).
const WEATHER_HTTP_TIMEOUT_SECS: u64 = 10;

/// Hourly rows kept per region (one day).
const FORECAST_HOURS: usize = 24;

/// Fallbacks for ragged or missing hourly arrays.
const DEFAULT_TEMP_C: f64 = 10.0;
const DEFAULT_WIND_KMH: f64 = 15.0;
const DEFAULT_SOLAR_WM2: f64 = 0.0;

/// Client for the Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct MeteoClient {
    client: reqwest::Client,
    base_url: String,
}

// --- Open-Meteo JSON response types ---

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    hourly: HourlyBlock,
}

#[derive(Debug, Default, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<f64>,
    #[serde(default)]
    windspeed_10m: Vec<f64>,
    #[serde(default)]
    direct_radiation: Vec<f64>,
}

impl MeteoClient {
    pub fn new() -> Self {
        Self::with_base_url(OPEN_METEO_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(WEATHER_HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    /// Fetch the one-day hourly forecast for a region.
    pub async fn fetch(&self, region: &Region) -> Result<WeatherObservation, AppError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", region.lat.to_string()),
                ("longitude", region.lon.to_string()),
                (
                    "hourly",
                    "temperature_2m,windspeed_10m,direct_radiation".to_string(),
                ),
                ("timezone", region.timezone.to_string()),
                ("forecast_days", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("open-meteo request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "open-meteo returned HTTP {}",
                response.status()
            )));
        }

        let body: ForecastResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("open-meteo JSON parse error: {}", e))
        })?;

        let now_hour = Utc::now().hour() as usize;
        Ok(build_observation(body.hourly, now_hour))
    }
}

impl Default for MeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize the raw hourly arrays into a `WeatherObservation`.
///
/// "Current" values come from the row at the current UTC hour, falling back
/// to the first row, then to fixed defaults. The hourly list is truncated to
/// 24 rows; short arrays are padded per-field with defaults.
fn build_observation(hourly: HourlyBlock, now_hour: usize) -> WeatherObservation {
    let temps = &hourly.temperature_2m;
    let winds = &hourly.windspeed_10m;
    let solar = &hourly.direct_radiation;

    let current_temp_c = temps
        .get(now_hour)
        .or_else(|| temps.first())
        .copied()
        .unwrap_or(DEFAULT_TEMP_C);
    let current_wind_kmh = winds
        .get(now_hour)
        .or_else(|| winds.first())
        .copied()
        .unwrap_or(DEFAULT_WIND_KMH);
    let current_solar_wm2 = solar.get(now_hour).copied().unwrap_or(DEFAULT_SOLAR_WM2);

    let rows = temps.len().min(FORECAST_HOURS);
    let hourly_rows = (0..rows)
        .map(|i| HourlyWeather {
            hour: hourly
                .time
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("{:02}:00", i)),
            temp_c: temps.get(i).copied().unwrap_or(DEFAULT_TEMP_C),
            wind_kmh: winds.get(i).copied().unwrap_or(DEFAULT_WIND_KMH),
            solar_wm2: solar.get(i).copied().unwrap_or(DEFAULT_SOLAR_WM2),
        })
        .collect();

    WeatherObservation {
        current_temp_c,
        current_wind_kmh,
        current_solar_wm2,
        hourly: hourly_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(hours: usize) -> HourlyBlock {
        HourlyBlock {
            time: (0..hours).map(|i| format!("2026-08-01T{:02}:00", i)).collect(),
            temperature_2m: (0..hours).map(|i| 10.0 + i as f64).collect(),
            windspeed_10m: (0..hours).map(|i| 5.0 + i as f64).collect(),
            direct_radiation: (0..hours).map(|i| i as f64 * 10.0).collect(),
        }
    }

    #[test]
    fn test_build_observation_current_hour() {
        let obs = build_observation(block(24), 14);
        assert_eq!(obs.current_temp_c, 24.0);
        assert_eq!(obs.current_wind_kmh, 19.0);
        assert_eq!(obs.current_solar_wm2, 140.0);
        assert_eq!(obs.hourly.len(), 24);
        assert_eq!(obs.hourly[3].hour, "2026-08-01T03:00");
    }

    #[test]
    fn test_build_observation_hour_beyond_data_falls_back_to_first() {
        let obs = build_observation(block(6), 14);
        assert_eq!(obs.current_temp_c, 10.0);
        assert_eq!(obs.current_wind_kmh, 5.0);
        // Solar has no first-row fallback; missing index means 0.0.
        assert_eq!(obs.current_solar_wm2, 0.0);
        assert_eq!(obs.hourly.len(), 6);
    }

    #[test]
    fn test_build_observation_empty_arrays() {
        let obs = build_observation(HourlyBlock::default(), 10);
        assert_eq!(obs.current_temp_c, 10.0);
        assert_eq!(obs.current_wind_kmh, 15.0);
        assert_eq!(obs.current_solar_wm2, 0.0);
        assert!(obs.hourly.is_empty());
    }

    #[test]
    fn test_build_observation_ragged_arrays_padded() {
        let hourly = HourlyBlock {
            time: vec!["2026-08-01T00:00".to_string()],
            temperature_2m: vec![12.0, 13.0, 14.0],
            windspeed_10m: vec![8.0],
            direct_radiation: vec![],
        };
        let obs = build_observation(hourly, 0);
        assert_eq!(obs.hourly.len(), 3);
        assert_eq!(obs.hourly[1].hour, "01:00");
        assert_eq!(obs.hourly[1].temp_c, 13.0);
        assert_eq!(obs.hourly[1].wind_kmh, 15.0);
        assert_eq!(obs.hourly[2].solar_wm2, 0.0);
    }

    #[test]
    fn test_build_observation_truncates_to_24_rows() {
        let obs = build_observation(block(48), 2);
        assert_eq!(obs.hourly.len(), 24);
    }

    #[tokio::test]
    async fn test_fetch_against_mock_server() {
        use wiremock::matchers::{method, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("forecast_days", "1"))
            .and(query_param(
                "hourly",
                "temperature_2m,windspeed_10m,direct_radiation",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hourly": {
                    "time": ["2026-08-01T00:00", "2026-08-01T01:00"],
                    "temperature_2m": [18.5, 17.9],
                    "windspeed_10m": [12.0, 14.5],
                    "direct_radiation": [0.0, 0.0]
                }
            })))
            .mount(&server)
            .await;

        let client = MeteoClient::with_base_url(&server.uri());
        let region = crate::catalog::region("francecentral").unwrap();
        let obs = client.fetch(region).await.unwrap();
        assert_eq!(obs.hourly.len(), 2);
        assert_eq!(obs.hourly[0].temp_c, 18.5);
    }

    #[tokio::test]
    async fn test_fetch_http_error_is_captured() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = MeteoClient::with_base_url(&server.uri());
        let region = crate::catalog::region("uksouth").unwrap();
        let err = client.fetch(region).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(_)));
    }
}

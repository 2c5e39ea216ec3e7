//! Azure Retail Prices client.
//!
//! For each region the fetcher issues one catalog query per GPU SKU family
//! (NC, NV, ND), classifies the returned meters into spot vs on-demand, and
//! keeps the cheapest price per SKU and class across OS variants. SKUs
//! without a spot price, and SKUs the GPU catalog does not recognize, are
//! dropped. Spot observations that the family queries left without an
//! on-demand price are enriched by a per-SKU follow-up query; if that fails
//! the on-demand price is estimated at 5x spot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::catalog;
use crate::errors::AppError;
use crate::helpers::{round1, round4, round6};
use crate::models::{Availability, SpotObservation};
use crate::services::market;

const AZURE_RETAIL_API_URL: &str = "https://prices.azure.com/api/retail/prices";

/// HTTP request timeout for Azure retail price calls (seconds).
const AZURE_HTTP_TIMEOUT_SECS: u64 = 15;

/// GPU SKU family filters (NC = compute, NV = visualization, ND = deep learning).
const SKU_FAMILIES: [&str; 3] = ["NC", "NV", "ND"];

/// On-demand price estimate when the per-SKU enrichment query fails.
const ONDEMAND_FALLBACK_MULTIPLIER: f64 = 5.0;

/// Savings assumed when on-demand pricing is unavailable.
const FALLBACK_SAVINGS_PCT: f64 = 80.0;

/// Client for the Azure Retail Prices API.
#[derive(Debug, Clone)]
pub struct AzureClient {
    client: reqwest::Client,
    base_url: String,
}

// --- Azure JSON response types ---

#[derive(Debug, Deserialize)]
struct RetailResponse {
    #[serde(rename = "Items", default)]
    items: Vec<RetailItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RetailItem {
    #[serde(rename = "armSkuName", default)]
    arm_sku_name: String,
    #[serde(rename = "retailPrice", default)]
    retail_price: f64,
    #[serde(rename = "unitOfMeasure", default)]
    unit_of_measure: String,
    #[serde(rename = "skuName", default)]
    sku_name: String,
    #[serde(rename = "meterName", default)]
    meter_name: String,
}

/// Result of one region's price fetch: whatever succeeded, plus errors.
#[derive(Debug, Default)]
pub struct PriceFetchOutcome {
    pub observations: Vec<SpotObservation>,
    pub errors: Vec<String>,
}

impl AzureClient {
    pub fn new() -> Self {
        Self::with_base_url(AZURE_RETAIL_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(AZURE_HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    async fn query(&self, filter: &str) -> Result<Vec<RetailItem>, AppError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("$filter", filter)])
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("azure request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "azure returned HTTP {}",
                response.status()
            )));
        }

        let body: RetailResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("azure JSON parse error: {}", e))
        })?;
        Ok(body.items)
    }

    /// Fetch and normalize all GPU spot observations for one region.
    ///
    /// Partial failures are captured as error strings; the caller gets the
    /// observations that could be built.
    pub async fn fetch_region_prices(&self, region_id: &str) -> PriceFetchOutcome {
        let mut outcome = PriceFetchOutcome::default();
        let mut spot_prices: BTreeMap<String, f64> = BTreeMap::new();
        let mut ondemand_prices: BTreeMap<String, f64> = BTreeMap::new();

        for family in SKU_FAMILIES {
            let filter = format!(
                "serviceName eq 'Virtual Machines' and armRegionName eq '{}' and contains(armSkuName, '{}')",
                region_id, family
            );
            match self.query(&filter).await {
                Ok(items) => {
                    let before = spot_prices.len();
                    collect_cheapest(&items, &mut spot_prices, &mut ondemand_prices);
                    tracing::info!(
                        "Azure {}/{}: {} GPU SKUs",
                        region_id,
                        family,
                        spot_prices.len() - before
                    );
                }
                Err(e) => {
                    outcome
                        .errors
                        .push(format!("Azure {}/{}: {}", region_id, family, e));
                }
            }
        }

        let now = Utc::now();
        let mut observations = build_observations(&spot_prices, &ondemand_prices, now);

        self.enrich_ondemand(region_id, &mut observations).await;

        observations.retain_mut(finalize_observation);
        outcome.observations = observations;
        outcome
    }

    /// Fill in missing on-demand prices with one per-SKU query each.
    ///
    /// A failed or empty lookup estimates on-demand at 5x spot with the
    /// fallback savings percentage.
    async fn enrich_ondemand(&self, region_id: &str, observations: &mut [SpotObservation]) {
        for obs in observations.iter_mut() {
            if obs.ondemand_price_usd_hr > 0.0 {
                continue;
            }
            let filter = format!(
                "serviceName eq 'Virtual Machines' and armRegionName eq '{}' and armSkuName eq '{}'",
                region_id, obs.sku
            );
            let ondemand = match self.query(&filter).await {
                Ok(items) => items
                    .iter()
                    .find(|item| is_usable(item) && !is_spot(item))
                    .map(|item| item.retail_price),
                Err(_) => None,
            };
            match ondemand {
                Some(price) => {
                    obs.ondemand_price_usd_hr = round4(price);
                }
                None => {
                    obs.ondemand_price_usd_hr =
                        round4(obs.spot_price_usd_hr * ONDEMAND_FALLBACK_MULTIPLIER);
                    obs.savings_pct = FALLBACK_SAVINGS_PCT;
                }
            }
        }
    }
}

impl Default for AzureClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Spot meters carry "Spot" or "Low Priority" in the SKU name.
fn is_spot(item: &RetailItem) -> bool {
    item.sku_name.contains("Spot")
        || item.sku_name.contains("Low Priority")
        || item.meter_name.contains("Spot")
        || item.meter_name.contains("Low Priority")
}

/// Only hourly meters with a positive price are considered.
fn is_usable(item: &RetailItem) -> bool {
    item.unit_of_measure == "1 Hour" && item.retail_price > 0.0
}

/// Keep the cheapest price per SKU and class across OS variants
/// (Windows and Linux meters share an armSkuName; Linux is usually cheaper).
fn collect_cheapest(
    items: &[RetailItem],
    spot_prices: &mut BTreeMap<String, f64>,
    ondemand_prices: &mut BTreeMap<String, f64>,
) {
    for item in items {
        if !is_usable(item) || item.arm_sku_name.is_empty() {
            continue;
        }
        let bucket = if is_spot(item) {
            &mut *spot_prices
        } else {
            &mut *ondemand_prices
        };
        bucket
            .entry(item.arm_sku_name.clone())
            .and_modify(|price| *price = price.min(item.retail_price))
            .or_insert(item.retail_price);
    }
}

/// Materialize observations for every SKU with a spot price and a catalog
/// entry. SKUs the catalog does not recognize are dropped silently.
fn build_observations(
    spot_prices: &BTreeMap<String, f64>,
    ondemand_prices: &BTreeMap<String, f64>,
    scraped_at: DateTime<Utc>,
) -> Vec<SpotObservation> {
    spot_prices
        .iter()
        .filter_map(|(sku, &spot)| {
            let spec = catalog::identify_gpu(sku)?;
            Some(SpotObservation {
                sku: sku.clone(),
                gpu_name: spec.gpu_name.to_string(),
                gpu_count: spec.gpu_count,
                vcpus: spec.vcpus,
                ram_gb: spec.ram_gb,
                tier: spec.tier,
                spot_price_usd_hr: round6(spot),
                ondemand_price_usd_hr: ondemand_prices.get(sku).copied().unwrap_or(0.0),
                savings_pct: 0.0,
                availability: Availability::High,
                scraped_at,
            })
        })
        .collect()
}

/// Derive savings and availability from the final spot/on-demand pair.
///
/// Returns false for malformed observations (spot above on-demand), which
/// are dropped.
fn finalize_observation(obs: &mut SpotObservation) -> bool {
    if obs.ondemand_price_usd_hr > 0.0 {
        if obs.spot_price_usd_hr > obs.ondemand_price_usd_hr {
            tracing::debug!(
                "dropping malformed observation {}: spot {} > on-demand {}",
                obs.sku,
                obs.spot_price_usd_hr,
                obs.ondemand_price_usd_hr
            );
            return false;
        }
        obs.savings_pct = round1((1.0 - obs.spot_price_usd_hr / obs.ondemand_price_usd_hr) * 100.0);
    } else if obs.savings_pct == 0.0 {
        obs.savings_pct = FALLBACK_SAVINGS_PCT;
    }
    obs.availability = market::availability_from_ratio(
        obs.spot_price_usd_hr,
        obs.ondemand_price_usd_hr,
        obs.tier,
        obs.spot_price_usd_hr,
    );
    true
}

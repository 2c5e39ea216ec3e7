//! Region and availability-zone HTTP endpoints.
//!
//! - GET /api/region?region_id=francecentral
//! - GET /api/azs?region_id=francecentral

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Timelike, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::catalog;
use crate::models::{AzInfo, RegionInfo};
use crate::services::{market, scoring};

use super::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct RegionQuery {
    /// Region identifier (unknown ids substitute the default region)
    pub region_id: Option<String>,
}

async fn build_region_info(state: &AppState, region_id: Option<&str>) -> RegionInfo {
    let region = catalog::region_or_default(region_id.unwrap_or(catalog::REGIONS[0].id));
    let prices = state.cache.region_prices(region.id).await;
    let weather = state.cache.region_weather(region.id).await;
    let carbon = state.cache.region_carbon(region.id).await;
    market::project_region(
        region,
        &prices,
        weather.as_ref(),
        carbon.as_ref(),
        Utc::now().hour(),
    )
}

/// Region overview with all availability zones and per-AZ GPU instances.
#[utoipa::path(
    get,
    path = "/api/region",
    tag = "Region & AZ",
    params(RegionQuery),
    responses(
        (status = 200, description = "Region info with AZ overview", body = RegionInfo),
    )
)]
pub async fn get_region(
    State(state): State<AppState>,
    Query(params): Query<RegionQuery>,
) -> Json<RegionInfo> {
    Json(build_region_info(&state, params.region_id.as_deref()).await)
}

/// All AZs of a region with their NERVE scores (lower = better).
#[utoipa::path(
    get,
    path = "/api/azs",
    tag = "Region & AZ",
    params(RegionQuery),
    responses(
        (status = 200, description = "AZ list with NERVE scores", body = Vec<AzInfo>),
    )
)]
pub async fn get_azs(
    State(state): State<AppState>,
    Query(params): Query<RegionQuery>,
) -> Json<Vec<AzInfo>> {
    let mut region = build_region_info(&state, params.region_id.as_deref()).await;

    // Fill each AZ's score with its best (minimum) instance score.
    for az in &mut region.availability_zones {
        az.score = az
            .gpu_instances
            .iter()
            .map(|gpu| {
                scoring::score_instance(
                    gpu,
                    az.carbon_intensity_gco2_kwh,
                    az.temperature_c,
                    az.wind_kmh,
                )
            })
            .min_by(|a, b| a.total_cmp(b));
    }

    Json(region.availability_zones)
}

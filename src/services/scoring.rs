//! NERVE scoring and job placement simulation.
//!
//! Every (region, AZ, SKU) candidate gets a weighted composite of normalized
//! price, carbon intensity, availability, cooling and renewable potential.
//! Lower is better. The best candidate becomes the decision; the previously
//! best becomes the standby fallback.

use chrono::{DateTime, Timelike, Utc};

use crate::cache::LiveCache;
use crate::catalog;
use crate::errors::AppError;
use crate::helpers::{round1, round2};
use crate::models::{
    Availability, CarbonIndex, CheckpointConfig, DashboardStats, Decision, Fallback, GpuInstance,
    GreenImpact, InterruptionRisk, RegionInfo, RiskAssessment, Savings, ServerStep,
    SimulateRequest, SimulateResponse, StartStrategy,
};
use crate::services::market;
use crate::services::stats::StatsStore;
use crate::services::timeshift;

// ---------------------------------------------------------------------------
// Scoring weights & normalization caps
// ---------------------------------------------------------------------------

const W_PRICE: f64 = 0.50;
const W_CARBON: f64 = 0.20;
const W_AVAILABILITY: f64 = 0.15;
const W_COOLING: f64 = 0.10;
const W_RENEWABLE: f64 = 0.05;

/// Spot price (USD/hr) normalized to 1.0.
const PRICE_NORM_MAX: f64 = 15.0;
/// Carbon intensity (gCO2/kWh) normalized to 1.0.
const CARBON_NORM_MAX: f64 = 500.0;
/// Temperature (degrees C) normalized to 1.0.
const COOLING_NORM_MAX: f64 = 40.0;
/// Wind speed (km/h) normalized to 1.0.
const RENEWABLE_NORM_MAX: f64 = 50.0;

/// Fixed dashboard estimate of the average spot discount.
const AVG_SAVINGS_PCT: f64 = 78.0;

/// Extra savings credited when a job is time-shifted into a cheaper window.
const TIME_SHIFT_BONUS_RATIO: f64 = 0.08;

/// Checkpoint size as a fraction of the job's GPU memory requirement.
const CHECKPOINT_SIZE_RATIO: f64 = 0.8;

/// Compute the NERVE score for one instance (lower = better).
pub fn score_instance(gpu: &GpuInstance, carbon_gco2: f64, temp_c: f64, wind_kmh: f64) -> f64 {
    let norm_price = (gpu.spot_price_usd_hr / PRICE_NORM_MAX).min(1.0);
    let norm_carbon = (carbon_gco2 / CARBON_NORM_MAX).min(1.0);
    let avail_score = gpu.availability.score();
    let norm_cooling = (temp_c.max(0.0) / COOLING_NORM_MAX).min(1.0);
    let renew_score = (wind_kmh / RENEWABLE_NORM_MAX).min(1.0);

    W_PRICE * norm_price
        + W_CARBON * norm_carbon
        + W_AVAILABILITY * (1.0 - avail_score)
        + W_COOLING * norm_cooling
        + W_RENEWABLE * (1.0 - renew_score)
}

// ---------------------------------------------------------------------------
// Candidate selection
// ---------------------------------------------------------------------------

/// A scored (region, AZ, SKU) candidate.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub region_id: String,
    pub az_id: String,
    pub gpu: GpuInstance,
    pub carbon_gco2: f64,
    pub carbon_index: CarbonIndex,
    pub score: f64,
}

/// Scan all candidates in iteration order (region list, then AZ order, then
/// SKU order) and return the best placement plus a fallback.
///
/// The fallback is the candidate that was best before the winner displaced
/// it; with a single eligible candidate the fallback equals the best.
pub(crate) fn select_best(
    regions: &[RegionInfo],
    min_gpu_memory_gb: u32,
) -> Option<(Placement, Placement)> {
    let mut best: Option<Placement> = None;
    let mut fallback: Option<Placement> = None;

    for region in regions {
        for az in &region.availability_zones {
            for gpu in &az.gpu_instances {
                if gpu.ram_gb < min_gpu_memory_gb {
                    continue;
                }
                let score = score_instance(
                    gpu,
                    az.carbon_intensity_gco2_kwh,
                    az.temperature_c,
                    az.wind_kmh,
                );
                let candidate = Placement {
                    region_id: region.region_id.clone(),
                    az_id: az.az_id.clone(),
                    gpu: gpu.clone(),
                    carbon_gco2: az.carbon_intensity_gco2_kwh,
                    carbon_index: az.carbon_index,
                    score,
                };
                match &best {
                    None => best = Some(candidate),
                    Some(current) if score < current.score => {
                        fallback = best.take();
                        best = Some(candidate);
                    }
                    Some(_) => {
                        if fallback.is_none() {
                            fallback = Some(candidate);
                        }
                    }
                }
            }
        }
    }

    let best = best?;
    let fallback = fallback.unwrap_or_else(|| best.clone());
    Some((best, fallback))
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Run the full placement simulation for a job.
pub async fn run_simulation(
    req: &SimulateRequest,
    cache: &LiveCache,
    stats: &StatsStore,
    timeshift_min_reduction_pct: f64,
) -> Result<SimulateResponse, AppError> {
    run_simulation_at(req, cache, stats, timeshift_min_reduction_pct, Utc::now()).await
}

pub(crate) async fn run_simulation_at(
    req: &SimulateRequest,
    cache: &LiveCache,
    stats: &StatsStore,
    timeshift_min_reduction_pct: f64,
    now: DateTime<Utc>,
) -> Result<SimulateResponse, AppError> {
    if req.estimated_gpu_hours <= 0.0 {
        return Err(AppError::BadRequest(
            "estimated_gpu_hours must be positive".to_string(),
        ));
    }

    tracing::info!(
        "simulating {:?} job '{}' ({} GPU hours, framework {})",
        req.job_type,
        req.model_name,
        req.estimated_gpu_hours,
        req.framework
    );

    // Candidate regions: the preferred one (unknown ids substitute the
    // default region) or every configured region.
    let region_ids: Vec<&str> = match req.preferred_region.as_deref() {
        Some(preferred) => vec![catalog::region_or_default(preferred).id],
        None => catalog::REGIONS.iter().map(|r| r.id).collect(),
    };

    let hour = now.hour();
    let regions = futures::future::join_all(region_ids.into_iter().map(|region_id| async move {
        let region = catalog::region_or_default(region_id);
        let prices = cache.region_prices(region.id).await;
        let weather = cache.region_weather(region.id).await;
        let carbon = cache.region_carbon(region.id).await;
        market::project_region(region, &prices, weather.as_ref(), carbon.as_ref(), hour)
    }))
    .await;

    let (best, fallback) = select_best(&regions, req.min_gpu_memory_gb).ok_or_else(|| {
        AppError::NoFit(format!(
            "no GPU instance with at least {} GB memory is currently observed",
            req.min_gpu_memory_gb
        ))
    })?;

    // Time-shift against the live curves of the winning region.
    let shift = timeshift::evaluate_at(
        cache,
        &best.region_id,
        req.deadline,
        req.estimated_gpu_hours,
        timeshift_min_reduction_pct,
        now,
    )
    .await;
    let strategy = if shift.recommended {
        StartStrategy::TimeShifted
    } else {
        StartStrategy::Immediate
    };

    let kwh_per_hr = catalog::identify_gpu(&best.gpu.sku)
        .map(|spec| spec.kwh_per_hr)
        .unwrap_or(catalog::DEFAULT_KWH_PER_HR);

    // Financials.
    let spot_total = best.gpu.spot_price_usd_hr * req.estimated_gpu_hours;
    let ondemand_total = best.gpu.ondemand_price_usd_hr * req.estimated_gpu_hours;
    let savings_usd = ondemand_total - spot_total;
    let time_shift_bonus = if shift.recommended {
        savings_usd * TIME_SHIFT_BONUS_RATIO
    } else {
        0.0
    };

    // Carbon.
    let total_kwh = kwh_per_hr * req.estimated_gpu_hours * catalog::DATACENTER_PUE;
    let total_co2 = total_kwh * best.carbon_gco2;
    let worst_co2 = total_kwh * catalog::WORST_CASE_GCO2_KWH;
    let co2_saved = worst_co2 - total_co2;

    stats.record_job(savings_usd, co2_saved);

    let start_time = shift.optimal_start.unwrap_or(now);

    Ok(SimulateResponse {
        decision: Decision {
            primary_region: best.region_id.clone(),
            primary_az: best.az_id.clone(),
            gpu_sku: best.gpu.sku.clone(),
            gpu_name: best.gpu.gpu_name.clone(),
            spot_price_usd_hr: best.gpu.spot_price_usd_hr,
            start_strategy: strategy,
            optimal_start_time: shift.optimal_start,
            reason: format!(
                "Best NERVE score ({:.3}) - {}% cheaper than on-demand, carbon {}",
                best.score, best.gpu.savings_pct, best.carbon_index
            ),
        },
        fallback: Fallback {
            secondary_az: fallback.az_id,
            secondary_sku: fallback.gpu.sku,
            fallback_reason: "Standby AZ in case of spot interruption".to_string(),
        },
        checkpointing: CheckpointConfig {
            recommended_interval_min: req.checkpoint_interval_min,
            storage_target: "s3".to_string(),
            estimated_checkpoint_size_gb: round2(
                req.min_gpu_memory_gb as f64 * CHECKPOINT_SIZE_RATIO,
            ),
            reason: format!(
                "Checkpoint every {} min to S3 for a guaranteed resume in under 90s",
                req.checkpoint_interval_min
            ),
        },
        savings: Savings {
            spot_cost_total_usd: round2(spot_total),
            ondemand_cost_total_usd: round2(ondemand_total),
            savings_usd: round2(savings_usd),
            savings_eur: round2(savings_usd * catalog::EUR_USD),
            savings_pct: round1(best.gpu.savings_pct),
            time_shift_extra_savings_usd: round2(time_shift_bonus),
        },
        green_impact: GreenImpact {
            carbon_intensity_gco2_kwh: best.carbon_gco2,
            total_energy_kwh: round2(total_kwh),
            total_co2_grams: round1(total_co2),
            co2_vs_worst_region_grams: round1(worst_co2),
            co2_saved_grams: round1(co2_saved),
            equivalent: format!(
                "Equivalent to {:.1} km of driving avoided",
                co2_saved / 120.0
            ),
        },
        server_path: vec![
            ServerStep {
                step: 1,
                action: "Launch job on spot GPU".to_string(),
                region: best.region_id.clone(),
                az: best.az_id.clone(),
                gpu: best.gpu.sku.clone(),
                time: start_time,
            },
            ServerStep {
                step: 2,
                action: "Checkpoint saved to S3 (automatic)".to_string(),
                region: best.region_id.clone(),
                az: best.az_id.clone(),
                gpu: best.gpu.sku.clone(),
                time: start_time,
            },
            ServerStep {
                step: 3,
                action: "Job complete, results available".to_string(),
                region: best.region_id,
                az: best.az_id,
                gpu: best.gpu.sku,
                time: req.deadline,
            },
        ],
        risk_assessment: RiskAssessment {
            spot_interruption_probability: match best.gpu.availability {
                Availability::High | Availability::Medium => InterruptionRisk::Low,
                Availability::Low | Availability::VeryLow => InterruptionRisk::Medium,
            },
            eviction_mitigation: "Smart Checkpointing + AZ-Hopping".to_string(),
            max_evictions_per_hour: 2,
        },
    })
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Aggregate counters for the dashboard endpoint.
pub fn dashboard_stats(stats: &StatsStore) -> DashboardStats {
    let snapshot = stats.snapshot();
    DashboardStats {
        total_jobs_managed: snapshot.total_jobs,
        total_savings_usd: round2(snapshot.total_savings_usd),
        total_savings_eur: round2(snapshot.total_savings_usd * catalog::EUR_USD),
        total_co2_saved_grams: round1(snapshot.total_co2_saved_g),
        total_checkpoints_saved: snapshot.total_checkpoints,
        total_evictions_handled: snapshot.total_evictions,
        avg_savings_pct: AVG_SAVINGS_PCT,
        uptime_pct: 100.0,
        regions_monitored: catalog::REGIONS.iter().map(|r| r.id.to_string()).collect(),
        last_updated: Utc::now(),
    }
}

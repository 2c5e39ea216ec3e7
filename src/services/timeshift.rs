//! Time-shifter: builds 24-hour price and carbon curves from live
//! observations and searches for the cheapest start window that still meets
//! the job's deadline.
//!
//! The price curve anchors on the live average spot price across the
//! region's observations, shaped by a fixed intraday factor table (night
//! trough around 03:00, midday peak around 12:00). The carbon curve scales
//! the region's current intensity by forecast wind and solar.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::cache::LiveCache;
use crate::helpers::{round1, round4};
use crate::models::{HourlyWeather, SpotObservation, TimeShiftPlan, TimeShiftRequest};

/// Intraday spot price shape, hour-of-day UTC -> multiplier on the average
/// spot price. Derived from observed diurnal demand cycles.
pub const INTRADAY_PRICE_FACTORS: [f64; 24] = [
    0.72, 0.66, 0.61, 0.58, 0.60, 0.64, // 00-05: night trough
    0.72, 0.82, 0.92, 1.00, 1.06, 1.10, // 06-11: morning ramp
    1.12, 1.10, 1.07, 1.03, 0.98, 0.95, // 12-17: midday peak, slow decay
    0.92, 0.88, 0.84, 0.80, 0.76, 0.74, // 18-23: evening descent
];

/// Flat price assumed when a region has no observations yet (USD/hr).
const FLAT_PRICE_USD_HR: f64 = 0.5;

/// Carbon intensity assumed when a region has no carbon observation yet.
const DEFAULT_GCO2_KWH: f64 = 100.0;

/// Outcome of the window search for a feasible schedule.
#[derive(Debug, Clone)]
pub struct OptimalWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub price_reduction_pct: f64,
    pub carbon_reduction_pct: f64,
}

/// Time-shift verdict used by the simulation path.
#[derive(Debug, Clone, Default)]
pub struct TimeShiftDecision {
    pub recommended: bool,
    pub optimal_start: Option<DateTime<Utc>>,
    pub optimal_end: Option<DateTime<Utc>>,
    pub price_reduction_pct: f64,
    pub carbon_reduction_pct: f64,
}

// ---------------------------------------------------------------------------
// Curve construction
// ---------------------------------------------------------------------------

/// Build the 24h price curve (hour-of-day -> USD/hr) for a region's
/// observations. No observations yields a flat default curve.
pub(crate) fn price_curve(observations: &[SpotObservation]) -> [f64; 24] {
    if observations.is_empty() {
        return [FLAT_PRICE_USD_HR; 24];
    }
    let avg_spot = observations
        .iter()
        .map(|o| o.spot_price_usd_hr)
        .sum::<f64>()
        / observations.len() as f64;

    let mut curve = [0.0; 24];
    for (hour, factor) in INTRADAY_PRICE_FACTORS.iter().enumerate() {
        curve[hour] = avg_spot * factor;
    }
    curve
}

/// Build the 24h carbon curve by scaling the current intensity with forecast
/// wind and solar. Hours past the forecast horizon fall back to the base.
pub(crate) fn carbon_curve(base_gco2: f64, hourly: &[HourlyWeather]) -> [f64; 24] {
    let mut curve = [base_gco2; 24];
    for (hour, slot) in curve.iter_mut().enumerate() {
        if let Some(row) = hourly.get(hour) {
            let wind_factor = (1.0 - row.wind_kmh / 100.0).max(0.7);
            let solar_factor = (1.0 - row.solar_wm2 / 500.0).max(0.8);
            *slot = base_gco2 * wind_factor * solar_factor;
        }
    }
    curve
}

// ---------------------------------------------------------------------------
// Window search
// ---------------------------------------------------------------------------

/// Sum of curve values over a run of `len` hours starting `offset` hours
/// from `now_hour`.
fn window_cost(curve: &[f64; 24], now_hour: u32, offset: usize, len: usize) -> f64 {
    (0..len)
        .map(|k| curve[(now_hour as usize + offset + k) % 24])
        .sum()
}

/// Find the cheapest integer start offset before the deadline.
///
/// Infeasible schedules (deadline closer than the job length) return None.
/// The run length includes one hour of safety margin. Ties resolve to the
/// earliest offset.
pub(crate) fn find_optimal_window(
    price: &[f64; 24],
    carbon: &[f64; 24],
    gpu_hours: f64,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<OptimalWindow> {
    let hours_until_deadline = (deadline - now).num_seconds() as f64 / 3600.0;
    if hours_until_deadline < gpu_hours {
        return None;
    }

    let run_len = gpu_hours.ceil() as usize + 1;
    let now_hour = now.hour();
    let max_offset = (hours_until_deadline - gpu_hours) as usize;

    let mut best_offset = 0;
    let mut best_cost = f64::INFINITY;
    for offset in 0..=max_offset {
        let cost = window_cost(price, now_hour, offset, run_len);
        if cost < best_cost {
            best_cost = cost;
            best_offset = offset;
        }
    }

    let start = now + Duration::hours(best_offset as i64);
    let end = start + Duration::seconds((gpu_hours * 3600.0).round() as i64);

    let current_cost = window_cost(price, now_hour, 0, run_len);
    let price_reduction_pct = if current_cost > 0.0 {
        ((current_cost - best_cost) / current_cost * 100.0).max(0.0)
    } else {
        0.0
    };

    let current_carbon = window_cost(carbon, now_hour, 0, run_len);
    let optimal_carbon = window_cost(carbon, now_hour, best_offset, run_len);
    let carbon_reduction_pct = if current_carbon > 0.0 {
        ((current_carbon - optimal_carbon) / current_carbon * 100.0).max(0.0)
    } else {
        0.0
    };

    Some(OptimalWindow {
        start,
        end,
        price_reduction_pct,
        carbon_reduction_pct,
    })
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

async fn region_curves(cache: &LiveCache, region_id: &str) -> ([f64; 24], [f64; 24]) {
    let observations = cache.region_prices(region_id).await;
    let weather = cache.region_weather(region_id).await;
    let base_gco2 = cache
        .region_carbon(region_id)
        .await
        .map(|c| c.gco2_kwh)
        .unwrap_or(DEFAULT_GCO2_KWH);
    let hourly = weather.map(|w| w.hourly).unwrap_or_default();
    (price_curve(&observations), carbon_curve(base_gco2, &hourly))
}

/// Quick verdict for the simulation path: shift when a cheaper window exists
/// and the price reduction clears the configured threshold.
pub async fn evaluate(
    cache: &LiveCache,
    region_id: &str,
    deadline: DateTime<Utc>,
    gpu_hours: f64,
    min_reduction_pct: f64,
) -> TimeShiftDecision {
    evaluate_at(cache, region_id, deadline, gpu_hours, min_reduction_pct, Utc::now()).await
}

pub(crate) async fn evaluate_at(
    cache: &LiveCache,
    region_id: &str,
    deadline: DateTime<Utc>,
    gpu_hours: f64,
    min_reduction_pct: f64,
    now: DateTime<Utc>,
) -> TimeShiftDecision {
    let (price, carbon) = region_curves(cache, region_id).await;
    match find_optimal_window(&price, &carbon, gpu_hours, deadline, now) {
        Some(window) if window.price_reduction_pct > min_reduction_pct => TimeShiftDecision {
            recommended: true,
            optimal_start: Some(window.start),
            optimal_end: Some(window.end),
            price_reduction_pct: window.price_reduction_pct,
            carbon_reduction_pct: window.carbon_reduction_pct,
        },
        _ => TimeShiftDecision::default(),
    }
}

/// Full time-shift plan for the planning endpoint.
pub async fn compute_plan(
    req: &TimeShiftRequest,
    cache: &LiveCache,
    min_reduction_pct: f64,
) -> TimeShiftPlan {
    compute_plan_at(req, cache, min_reduction_pct, Utc::now()).await
}

pub(crate) async fn compute_plan_at(
    req: &TimeShiftRequest,
    cache: &LiveCache,
    min_reduction_pct: f64,
    now: DateTime<Utc>,
) -> TimeShiftPlan {
    let region_id = req
        .preferred_region
        .as_deref()
        .map(|id| crate::catalog::region_or_default(id).id)
        .unwrap_or(crate::catalog::REGIONS[0].id);
    tracing::debug!(
        "planning time shift for a {:?} job in {} ({} GPU hours, min {} GB)",
        req.job_type,
        region_id,
        req.estimated_gpu_hours,
        req.min_gpu_memory_gb
    );
    let (price, carbon) = region_curves(cache, region_id).await;
    let current_price = price[now.hour() as usize];

    let Some(window) = find_optimal_window(&price, &carbon, req.estimated_gpu_hours, req.deadline, now)
    else {
        return TimeShiftPlan {
            recommended: false,
            optimal_window_start: None,
            optimal_window_end: None,
            reason: "Deadline is closer than the estimated GPU hours; the job must start \
                     immediately to have any chance of finishing"
                .to_string(),
            estimated_spot_price_usd_hr: round4(current_price),
            current_spot_price_usd_hr: round4(current_price),
            price_reduction_pct: 0.0,
            carbon_reduction_pct: 0.0,
            meets_deadline: false,
        };
    };

    let meets_deadline = window.end <= req.deadline;
    let recommended =
        window.price_reduction_pct > min_reduction_pct && req.flexible && meets_deadline;
    let optimal_price = price[window.start.hour() as usize];

    let reason = if recommended {
        format!(
            "Shifting the start to {} cuts cost by {:.0}% and carbon by {:.0}%",
            window.start.format("%H:%M UTC"),
            window.price_reduction_pct,
            window.carbon_reduction_pct
        )
    } else {
        "The current window is already optimal or the deadline leaves no room to shift".to_string()
    };

    TimeShiftPlan {
        recommended,
        optimal_window_start: Some(window.start),
        optimal_window_end: Some(window.end),
        reason,
        estimated_spot_price_usd_hr: round4(optimal_price),
        current_spot_price_usd_hr: round4(current_price),
        price_reduction_pct: round1(window.price_reduction_pct),
        carbon_reduction_pct: round1(window.carbon_reduction_pct),
        meets_deadline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, GpuTier};
    use chrono::TimeZone;

    fn observation(spot: f64) -> SpotObservation {
        SpotObservation {
            sku: "Standard_NC6s_v3".to_string(),
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

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_factor_table_anchors() {
        assert_eq!(INTRADAY_PRICE_FACTORS[3], 0.58);
        assert_eq!(INTRADAY_PRICE_FACTORS[12], 1.12);
        // Night hours are troughs, midday hours are peaks.
        assert!(INTRADAY_PRICE_FACTORS[2] < 0.7);
        assert!(INTRADAY_PRICE_FACTORS[11] > 1.0);
    }

    #[test]
    fn test_price_curve_scales_average_spot() {
        let curve = price_curve(&[observation(1.0), observation(3.0)]);
        // avg spot 2.0, hour 12 factor 1.12
        assert!((curve[12] - 2.24).abs() < 1e-9);
        assert!((curve[3] - 1.16).abs() < 1e-9);
    }

    #[test]
    fn test_price_curve_empty_is_flat() {
        let curve = price_curve(&[]);
        assert!(curve.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_carbon_curve_scaling_and_floors() {
        let hourly = vec![
            HourlyWeather { hour: "00:00".to_string(), temp_c: 10.0, wind_kmh: 50.0, solar_wm2: 0.0 },
            HourlyWeather { hour: "01:00".to_string(), temp_c: 10.0, wind_kmh: 200.0, solar_wm2: 5000.0 },
        ];
        let curve = carbon_curve(100.0, &hourly);
        // Hour 0: wind factor 0.5 floored at 0.7, solar factor 1.0.
        assert!((curve[0] - 70.0).abs() < 1e-9);
        // Hour 1: both factors floored (0.7 * 0.8).
        assert!((curve[1] - 56.0).abs() < 1e-9);
        // Beyond the forecast horizon: base value.
        assert_eq!(curve[5], 100.0);
    }

    #[test]
    fn test_window_search_picks_night_trough() {
        let curve = price_curve(&[observation(1.0)]);
        let carbon = [100.0; 24];
        let now = at_hour(12);
        let deadline = now + Duration::hours(20);
        let window = find_optimal_window(&curve, &carbon, 2.0, deadline, now).unwrap();
        // From 12:00 with 18 candidate offsets, the cheapest 3h run starts
        // at 02:00 (covering 02-04, centered on the 03:00 trough).
        assert_eq!(window.start, at_hour(12) + Duration::hours(14));
        assert_eq!(window.start.hour(), 2);
        assert!(window.price_reduction_pct > 5.0);
        assert_eq!(window.end - window.start, Duration::hours(2));
    }

    #[test]
    fn test_window_search_is_deterministic() {
        let curve = price_curve(&[observation(1.0)]);
        let carbon = [100.0; 24];
        let now = at_hour(12);
        let deadline = now + Duration::hours(20);
        let a = find_optimal_window(&curve, &carbon, 2.0, deadline, now).unwrap();
        let b = find_optimal_window(&curve, &carbon, 2.0, deadline, now).unwrap();
        assert_eq!(a.start, b.start);
        assert_eq!(a.price_reduction_pct, b.price_reduction_pct);
    }

    #[test]
    fn test_window_search_infeasible_deadline() {
        let curve = [1.0; 24];
        let carbon = [100.0; 24];
        let now = at_hour(12);
        let deadline = now + Duration::hours(1);
        assert!(find_optimal_window(&curve, &carbon, 2.0, deadline, now).is_none());
    }

    #[test]
    fn test_window_search_flat_curve_stays_now() {
        let curve = [0.5; 24];
        let carbon = [100.0; 24];
        let now = at_hour(8);
        let deadline = now + Duration::hours(10);
        let window = find_optimal_window(&curve, &carbon, 2.0, deadline, now).unwrap();
        // All offsets cost the same; the earliest wins.
        assert_eq!(window.start, now);
        assert_eq!(window.price_reduction_pct, 0.0);
    }

    #[test]
    fn test_window_respects_deadline() {
        let curve = price_curve(&[observation(1.0)]);
        let carbon = [100.0; 24];
        let now = at_hour(12);
        // Only 10 hours of room: the 03:00 trough is unreachable.
        let deadline = now + Duration::hours(10);
        let window = find_optimal_window(&curve, &carbon, 2.0, deadline, now).unwrap();
        assert!(window.end <= deadline);
        // Best reachable window is the latest offset, toward the evening dip.
        assert_eq!(window.start.hour(), 20);
    }

    #[test]
    fn test_run_length_includes_safety_margin() {
        // 2.5 GPU hours: ceil(2.5) + 1 = 4 slots summed per window. With
        // zero-cost hours at 10-12 only, a 4-slot window must pay one full
        // hour on either side; the tie resolves to the earlier start (09:00).
        let mut curve = [1.0; 24];
        curve[10] = 0.0;
        curve[11] = 0.0;
        curve[12] = 0.0;
        let carbon = [100.0; 24];
        let now = at_hour(8);
        let deadline = now + Duration::hours(12);
        let window = find_optimal_window(&curve, &carbon, 2.5, deadline, now).unwrap();
        assert_eq!(window.start.hour(), 9);
    }

    #[tokio::test]
    async fn test_compute_plan_infeasible() {
        let cache = LiveCache::new();
        let now = at_hour(12);
        let req: TimeShiftRequest = serde_json::from_value(serde_json::json!({
            "deadline": (now + Duration::minutes(30)).to_rfc3339(),
            "estimated_gpu_hours": 4.0
        }))
        .unwrap();
        let plan = compute_plan_at(&req, &cache, 5.0, now).await;
        assert!(!plan.recommended);
        assert!(!plan.meets_deadline);
        assert!(plan.optimal_window_start.is_none());
    }

    #[tokio::test]
    async fn test_compute_plan_inflexible_job_not_recommended() {
        let cache = LiveCache::new();
        cache
            .replace_region("francecentral", Some(vec![observation(1.0)]), None, None)
            .await;
        let now = at_hour(12);
        let req: TimeShiftRequest = serde_json::from_value(serde_json::json!({
            "deadline": (now + Duration::hours(30)).to_rfc3339(),
            "estimated_gpu_hours": 2.0,
            "flexible": false
        }))
        .unwrap();
        let plan = compute_plan_at(&req, &cache, 5.0, now).await;
        assert!(!plan.recommended, "inflexible jobs are never shifted");
        assert!(plan.meets_deadline);
    }

    #[tokio::test]
    async fn test_compute_plan_recommends_trough_window() {
        let cache = LiveCache::new();
        cache
            .replace_region("francecentral", Some(vec![observation(1.0)]), None, None)
            .await;
        // Midday start with 30h of slack always reaches the night trough.
        let now = at_hour(12);
        let req: TimeShiftRequest = serde_json::from_value(serde_json::json!({
            "deadline": (now + Duration::hours(30)).to_rfc3339(),
            "estimated_gpu_hours": 2.0
        }))
        .unwrap();
        let plan = compute_plan_at(&req, &cache, 5.0, now).await;
        assert!(plan.recommended);
        assert!(plan.price_reduction_pct > 5.0);
        assert!(plan.estimated_spot_price_usd_hr < plan.current_spot_price_usd_hr);
        assert!(plan.meets_deadline);
        assert_eq!(plan.optimal_window_start.unwrap().hour(), 2);
    }

    #[tokio::test]
    async fn test_evaluate_respects_threshold() {
        let cache = LiveCache::new();
        cache
            .replace_region("francecentral", Some(vec![observation(1.0)]), None, None)
            .await;
        let now = at_hour(12);
        let deadline = now + Duration::hours(30);
        let shifted = evaluate_at(&cache, "francecentral", deadline, 2.0, 5.0, now).await;
        assert!(shifted.recommended);
        assert!(shifted.optimal_start.is_some());
        // An absurd threshold suppresses the recommendation.
        let suppressed = evaluate_at(&cache, "francecentral", deadline, 2.0, 99.0, now).await;
        assert!(!suppressed.recommended);
        assert!(suppressed.optimal_start.is_none());
    }
}

//! Core data model: enums, observations and API request/response records.
//!
//! Observations are produced by the scraper and read by the scorer,
//! time-shifter and checkpoint simulator. They are never mutated in place;
//! each scrape cycle replaces the per-region records wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Workload category submitted for placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    #[default]
    LlmFineTuning,
    LlmInference,
    #[serde(rename = "rendering_3d")]
    Rendering3d,
    DataEtl,
}

/// Spot capacity availability tier, derived from the spot/on-demand ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    High,
    Medium,
    Low,
    VeryLow,
}

impl Availability {
    /// Scoring weight: 1.0 = plenty of capacity, 0.1 = very scarce.
    pub fn score(self) -> f64 {
        match self {
            Availability::High => 1.0,
            Availability::Medium => 0.7,
            Availability::Low => 0.4,
            Availability::VeryLow => 0.1,
        }
    }

    /// One step down the tier ladder (used by the per-AZ load shift).
    pub fn downgraded(self) -> Self {
        match self {
            Availability::High => Availability::Medium,
            Availability::Medium => Availability::Low,
            Availability::Low | Availability::VeryLow => self,
        }
    }
}

/// Categorical grid-carbon band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CarbonIndex {
    #[serde(rename = "very low")]
    VeryLow,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "very high")]
    VeryHigh,
}

impl std::fmt::Display for CarbonIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CarbonIndex::VeryLow => "very low",
            CarbonIndex::Low => "low",
            CarbonIndex::Moderate => "moderate",
            CarbonIndex::High => "high",
            CarbonIndex::VeryHigh => "very high",
        };
        f.write_str(label)
    }
}

/// GPU instance class (pricing/capacity segment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GpuTier {
    Low,
    Mid,
    High,
    Premium,
    Ultra,
}

/// When the recommended job should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StartStrategy {
    Immediate,
    TimeShifted,
}

/// Probability band for a spot interruption during the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionRisk {
    Low,
    Medium,
    High,
}

// ---------------------------------------------------------------------------
// Observations (scraper output, cache contents)
// ---------------------------------------------------------------------------

/// Region-level spot price observation for one SKU. Last writer wins.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpotObservation {
    /// Azure instance-type identifier (e.g. "Standard_NC6s_v3")
    pub sku: String,
    /// Human-readable GPU name (e.g. "Tesla V100 (16GB)")
    pub gpu_name: String,
    pub gpu_count: u32,
    pub vcpus: u32,
    pub ram_gb: u32,
    pub tier: GpuTier,
    pub spot_price_usd_hr: f64,
    pub ondemand_price_usd_hr: f64,
    /// Discount vs on-demand, percent (0-100)
    pub savings_pct: f64,
    pub availability: Availability,
    pub scraped_at: DateTime<Utc>,
}

/// One hourly weather forecast row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HourlyWeather {
    /// Source-provided hour label (e.g. "2026-08-01T14:00")
    pub hour: String,
    pub temp_c: f64,
    pub wind_kmh: f64,
    pub solar_wm2: f64,
}

/// Per-region weather snapshot with a one-day hourly forecast.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WeatherObservation {
    pub current_temp_c: f64,
    pub current_wind_kmh: f64,
    pub current_solar_wm2: f64,
    pub hourly: Vec<HourlyWeather>,
}

/// Per-region grid carbon intensity (live API or weather-based model).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarbonObservation {
    pub gco2_kwh: f64,
    pub index: CarbonIndex,
    /// Where the figure came from (live API or the weather model)
    pub source: String,
    /// Validity window start, when the live API provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    /// Validity window end, when the live API provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<String>,
}

/// One entry of the per-region 24h price-history ring.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PriceHistoryEntry {
    pub timestamp: DateTime<Utc>,
    /// Hour of day (UTC) at scrape time
    pub hour: u32,
    pub avg_spot: f64,
    pub min_spot: f64,
    pub max_spot: f64,
    /// Average over compute-family SKUs only (NC/ND)
    pub avg_compute_spot: f64,
    pub gpu_count: usize,
}

// ---------------------------------------------------------------------------
// Projected (per-AZ) views served to clients
// ---------------------------------------------------------------------------

/// A GPU instance offer as seen from one availability zone.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GpuInstance {
    pub sku: String,
    pub gpu_name: String,
    pub gpu_count: u32,
    pub vcpus: u32,
    pub ram_gb: u32,
    pub spot_price_usd_hr: f64,
    pub ondemand_price_usd_hr: f64,
    pub savings_pct: f64,
    pub availability: Availability,
}

/// One availability zone with its instances and environmental signals.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AzInfo {
    pub az_id: String,
    pub az_name: String,
    pub gpu_instances: Vec<GpuInstance>,
    pub carbon_intensity_gco2_kwh: f64,
    pub carbon_index: CarbonIndex,
    pub temperature_c: f64,
    pub wind_kmh: f64,
    /// NERVE score of the best instance in this AZ (lower = better);
    /// None when no instance data is available yet
    pub score: Option<f64>,
}

/// A region with all its availability zones.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegionInfo {
    pub region_id: String,
    pub region_name: String,
    pub cloud_provider: String,
    pub location: String,
    pub availability_zones: Vec<AzInfo>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn default_model_name() -> String {
    "LLaMA-7B".to_string()
}

fn default_gpu_hours() -> f64 {
    24.0
}

fn default_min_gpu_memory_gb() -> u32 {
    16
}

fn default_framework() -> String {
    "pytorch".to_string()
}

fn default_checkpoint_interval_min() -> u32 {
    30
}

fn default_region_id() -> String {
    "francecentral".to_string()
}

fn default_az_id() -> String {
    "fr-central-1".to_string()
}

fn default_sku() -> String {
    "Standard_NC6s_v3".to_string()
}

fn default_epoch_progress() -> f64 {
    42.0
}

fn default_model_size_gb() -> f64 {
    14.0
}

fn default_flexible() -> bool {
    true
}

/// Job placement request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SimulateRequest {
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_gpu_hours")]
    pub estimated_gpu_hours: f64,
    /// Absolute UTC deadline the job must finish by
    pub deadline: DateTime<Utc>,
    #[serde(default = "default_min_gpu_memory_gb")]
    pub min_gpu_memory_gb: u32,
    #[serde(default = "default_framework")]
    pub framework: String,
    #[serde(default = "default_checkpoint_interval_min")]
    pub checkpoint_interval_min: u32,
    #[serde(default)]
    pub preferred_region: Option<String>,
}

/// Spot interruption / migration simulation request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckpointSimulateRequest {
    pub job_id: String,
    #[serde(default = "default_region_id")]
    pub current_region: String,
    #[serde(default = "default_az_id")]
    pub current_az: String,
    #[serde(default = "default_sku")]
    pub current_sku: String,
    #[serde(default = "default_epoch_progress")]
    pub epoch_progress_pct: f64,
    #[serde(default = "default_model_size_gb")]
    pub model_size_gb: f64,
}

/// Time-shift planning request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TimeShiftRequest {
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default = "default_gpu_hours")]
    pub estimated_gpu_hours: f64,
    pub deadline: DateTime<Utc>,
    #[serde(default = "default_min_gpu_memory_gb")]
    pub min_gpu_memory_gb: u32,
    #[serde(default)]
    pub preferred_region: Option<String>,
    /// Whether the job's start time may be deferred at all
    #[serde(default = "default_flexible")]
    pub flexible: bool,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// The primary placement decision.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Decision {
    pub primary_region: String,
    pub primary_az: String,
    pub gpu_sku: String,
    pub gpu_name: String,
    pub spot_price_usd_hr: f64,
    pub start_strategy: StartStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_start_time: Option<DateTime<Utc>>,
    pub reason: String,
}

/// Standby placement used if the primary is interrupted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Fallback {
    pub secondary_az: String,
    pub secondary_sku: String,
    pub fallback_reason: String,
}

/// Recommended checkpointing configuration for the job.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckpointConfig {
    pub recommended_interval_min: u32,
    pub storage_target: String,
    pub estimated_checkpoint_size_gb: f64,
    pub reason: String,
}

/// Cost comparison between spot and on-demand for the job.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Savings {
    pub spot_cost_total_usd: f64,
    pub ondemand_cost_total_usd: f64,
    pub savings_usd: f64,
    pub savings_eur: f64,
    pub savings_pct: f64,
    pub time_shift_extra_savings_usd: f64,
}

/// Carbon footprint of the job vs the worst-case grid.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GreenImpact {
    pub carbon_intensity_gco2_kwh: f64,
    pub total_energy_kwh: f64,
    pub total_co2_grams: f64,
    pub co2_vs_worst_region_grams: f64,
    pub co2_saved_grams: f64,
    /// Human-readable comparison (car km avoided)
    pub equivalent: String,
}

/// One step of the launch/checkpoint/complete server path.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServerStep {
    pub step: u32,
    pub action: String,
    pub region: String,
    pub az: String,
    pub gpu: String,
    pub time: DateTime<Utc>,
}

/// Spot interruption risk for the chosen placement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RiskAssessment {
    pub spot_interruption_probability: InterruptionRisk,
    pub eviction_mitigation: String,
    pub max_evictions_per_hour: u32,
}

/// Full simulation response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimulateResponse {
    pub decision: Decision,
    pub fallback: Fallback,
    pub checkpointing: CheckpointConfig,
    pub savings: Savings,
    pub green_impact: GreenImpact,
    pub server_path: Vec<ServerStep>,
    pub risk_assessment: RiskAssessment,
}

/// One step of the simulated evacuation timeline, in seconds from T0.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimelineStep {
    pub time_sec: f64,
    pub event: String,
}

/// Result of a simulated spot interruption with AZ-hopping migration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckpointEvent {
    pub job_id: String,
    pub status: String,
    pub checkpoint_saved: bool,
    pub checkpoint_size_gb: f64,
    pub save_duration_sec: f64,
    pub from_az: String,
    pub to_az: String,
    pub downtime_ms: u64,
    pub epoch_progress_pct: f64,
    pub resumed: bool,
    pub timeline: Vec<TimelineStep>,
}

/// Recommended start window for a deferrable job.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimeShiftPlan {
    pub recommended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_window_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_window_end: Option<DateTime<Utc>>,
    pub reason: String,
    pub estimated_spot_price_usd_hr: f64,
    pub current_spot_price_usd_hr: f64,
    pub price_reduction_pct: f64,
    pub carbon_reduction_pct: f64,
    pub meets_deadline: bool,
}

/// Aggregated FinOps/GreenOps counters for the dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_jobs_managed: u64,
    pub total_savings_usd: f64,
    pub total_savings_eur: f64,
    pub total_co2_saved_grams: f64,
    pub total_checkpoints_saved: u64,
    pub total_evictions_handled: u64,
    pub avg_savings_pct: f64,
    pub uptime_pct: f64,
    pub regions_monitored: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

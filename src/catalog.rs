//! Static tables: monitored regions, availability zones, GPU SKU catalog,
//! grid generation mix and emission factors.
//!
//! Everything here is read-only after initialization. The AZ neighbor graph
//! is a disjoint union of 3-cycles (one per region), so every AZ always has
//! a migration target.

use crate::models::GpuTier;

// ---------------------------------------------------------------------------
// Regions & availability zones
// ---------------------------------------------------------------------------

/// One availability zone and its migration neighbor.
#[derive(Debug, Clone, Copy)]
pub struct AzDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    /// Neighbor AZ used as the evacuation target on spot interruption.
    pub neighbor: &'static str,
}

/// A monitored cloud region.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub id: &'static str,
    pub name: &'static str,
    pub cloud_provider: &'static str,
    pub location: &'static str,
    pub lat: f64,
    pub lon: f64,
    /// IANA timezone label passed to the weather API.
    pub timezone: &'static str,
    pub azs: &'static [AzDescriptor],
}

pub const REGIONS: &[Region] = &[
    Region {
        id: "francecentral",
        name: "France Central",
        cloud_provider: "azure",
        location: "Paris, France",
        lat: 48.8566,
        lon: 2.3522,
        timezone: "Europe/Paris",
        azs: &[
            AzDescriptor { id: "fr-central-1", name: "France Central AZ-1", neighbor: "fr-central-2" },
            AzDescriptor { id: "fr-central-2", name: "France Central AZ-2", neighbor: "fr-central-3" },
            AzDescriptor { id: "fr-central-3", name: "France Central AZ-3", neighbor: "fr-central-1" },
        ],
    },
    Region {
        id: "westeurope",
        name: "West Europe",
        cloud_provider: "azure",
        location: "Amsterdam, Netherlands",
        lat: 52.3676,
        lon: 4.9041,
        timezone: "Europe/Amsterdam",
        azs: &[
            AzDescriptor { id: "we-1", name: "West Europe AZ-1", neighbor: "we-2" },
            AzDescriptor { id: "we-2", name: "West Europe AZ-2", neighbor: "we-3" },
            AzDescriptor { id: "we-3", name: "West Europe AZ-3", neighbor: "we-1" },
        ],
    },
    Region {
        id: "uksouth",
        name: "UK South",
        cloud_provider: "azure",
        location: "London, UK",
        lat: 51.5074,
        lon: -0.1278,
        timezone: "Europe/London",
        azs: &[
            AzDescriptor { id: "uk-south-1", name: "UK South AZ-1", neighbor: "uk-south-2" },
            AzDescriptor { id: "uk-south-2", name: "UK South AZ-2", neighbor: "uk-south-3" },
            AzDescriptor { id: "uk-south-3", name: "UK South AZ-3", neighbor: "uk-south-1" },
        ],
    },
];

/// Region with a live carbon intensity API (all others use the weather model).
pub const LIVE_CARBON_REGION: &str = "uksouth";

/// Look up a region by id.
pub fn region(region_id: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.id == region_id)
}

/// Look up a region by id, substituting the first configured region for
/// unknown ids (requests never fail on a bad region).
pub fn region_or_default(region_id: &str) -> &'static Region {
    region(region_id).unwrap_or(&REGIONS[0])
}

/// Neighbor AZ for migration fallback. The neighbor map is a disjoint union
/// of cycles, so any known AZ resolves.
pub fn neighbor_az(az_id: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .flat_map(|r| r.azs.iter())
        .find(|az| az.id == az_id)
        .map(|az| az.neighbor)
}

// ---------------------------------------------------------------------------
// GPU catalog
// ---------------------------------------------------------------------------

/// Specs for one Azure GPU SKU family member.
#[derive(Debug, Clone, Copy)]
pub struct GpuSpec {
    /// Lower-case key matched against the SKU name by containment.
    pub key: &'static str,
    pub gpu_name: &'static str,
    pub gpu_count: u32,
    pub vcpus: u32,
    pub ram_gb: u32,
    pub tier: GpuTier,
    /// Energy draw of the whole instance, kWh per hour.
    pub kwh_per_hr: f64,
}

pub const GPU_CATALOG: &[GpuSpec] = &[
    GpuSpec { key: "nc6s_v3", gpu_name: "Tesla V100 (16GB)", gpu_count: 1, vcpus: 6, ram_gb: 112, tier: GpuTier::High, kwh_per_hr: 0.30 },
    GpuSpec { key: "nc12s_v3", gpu_name: "Tesla V100 (16GB)", gpu_count: 2, vcpus: 12, ram_gb: 224, tier: GpuTier::High, kwh_per_hr: 0.30 },
    GpuSpec { key: "nc24s_v3", gpu_name: "Tesla V100 (16GB)", gpu_count: 4, vcpus: 24, ram_gb: 448, tier: GpuTier::High, kwh_per_hr: 0.30 },
    GpuSpec { key: "nc24rs_v3", gpu_name: "Tesla V100 (16GB)", gpu_count: 4, vcpus: 24, ram_gb: 448, tier: GpuTier::High, kwh_per_hr: 0.30 },
    GpuSpec { key: "nc4as_t4_v3", gpu_name: "Tesla T4 (16GB)", gpu_count: 1, vcpus: 4, ram_gb: 28, tier: GpuTier::Mid, kwh_per_hr: 0.07 },
    GpuSpec { key: "nc8as_t4_v3", gpu_name: "Tesla T4 (16GB)", gpu_count: 1, vcpus: 8, ram_gb: 56, tier: GpuTier::Mid, kwh_per_hr: 0.07 },
    GpuSpec { key: "nc16as_t4_v3", gpu_name: "Tesla T4 (16GB)", gpu_count: 1, vcpus: 16, ram_gb: 110, tier: GpuTier::Mid, kwh_per_hr: 0.07 },
    GpuSpec { key: "nc64as_t4_v3", gpu_name: "Tesla T4 (16GB)", gpu_count: 4, vcpus: 64, ram_gb: 440, tier: GpuTier::Mid, kwh_per_hr: 0.07 },
    GpuSpec { key: "nc8ads_a10_v4", gpu_name: "A10 (24GB)", gpu_count: 1, vcpus: 8, ram_gb: 55, tier: GpuTier::Mid, kwh_per_hr: 0.15 },
    GpuSpec { key: "nc16ads_a10_v4", gpu_name: "A10 (24GB)", gpu_count: 1, vcpus: 16, ram_gb: 110, tier: GpuTier::Mid, kwh_per_hr: 0.15 },
    GpuSpec { key: "nc32ads_a10_v4", gpu_name: "A10 (24GB)", gpu_count: 2, vcpus: 32, ram_gb: 220, tier: GpuTier::Mid, kwh_per_hr: 0.15 },
    GpuSpec { key: "nc48ads_a100_v4", gpu_name: "A100 (80GB)", gpu_count: 2, vcpus: 48, ram_gb: 440, tier: GpuTier::Premium, kwh_per_hr: 0.40 },
    GpuSpec { key: "nc96ads_a100_v4", gpu_name: "A100 (80GB)", gpu_count: 4, vcpus: 96, ram_gb: 880, tier: GpuTier::Premium, kwh_per_hr: 0.40 },
    GpuSpec { key: "ncc40ads_h100_v5", gpu_name: "H100 (80GB)", gpu_count: 1, vcpus: 40, ram_gb: 320, tier: GpuTier::Premium, kwh_per_hr: 0.70 },
    GpuSpec { key: "nc80adis_h100_v5", gpu_name: "H100 (80GB)", gpu_count: 2, vcpus: 80, ram_gb: 640, tier: GpuTier::Premium, kwh_per_hr: 0.70 },
    GpuSpec { key: "nv6ads_a10_v5", gpu_name: "A10 (6GB slice)", gpu_count: 1, vcpus: 6, ram_gb: 55, tier: GpuTier::Low, kwh_per_hr: 0.15 },
    GpuSpec { key: "nv12ads_a10_v5", gpu_name: "A10 (12GB slice)", gpu_count: 1, vcpus: 12, ram_gb: 110, tier: GpuTier::Low, kwh_per_hr: 0.15 },
    GpuSpec { key: "nv18ads_a10_v5", gpu_name: "A10 (18GB slice)", gpu_count: 1, vcpus: 18, ram_gb: 220, tier: GpuTier::Mid, kwh_per_hr: 0.15 },
    GpuSpec { key: "nv36ads_a10_v5", gpu_name: "A10 (24GB)", gpu_count: 1, vcpus: 36, ram_gb: 440, tier: GpuTier::Mid, kwh_per_hr: 0.15 },
    GpuSpec { key: "nv4as_v4", gpu_name: "Radeon MI25 (4GB)", gpu_count: 1, vcpus: 4, ram_gb: 14, tier: GpuTier::Low, kwh_per_hr: 0.10 },
    GpuSpec { key: "nv8as_v4", gpu_name: "Radeon MI25 (8GB)", gpu_count: 1, vcpus: 8, ram_gb: 28, tier: GpuTier::Low, kwh_per_hr: 0.10 },
    GpuSpec { key: "nv16as_v4", gpu_name: "Radeon MI25 (16GB)", gpu_count: 1, vcpus: 16, ram_gb: 56, tier: GpuTier::Low, kwh_per_hr: 0.10 },
    GpuSpec { key: "nv32as_v4", gpu_name: "Radeon MI25 (32GB)", gpu_count: 1, vcpus: 32, ram_gb: 112, tier: GpuTier::Low, kwh_per_hr: 0.10 },
    GpuSpec { key: "nv12s_v3", gpu_name: "Tesla M60 (8GB)", gpu_count: 1, vcpus: 12, ram_gb: 112, tier: GpuTier::Low, kwh_per_hr: 0.12 },
    GpuSpec { key: "nv24s_v3", gpu_name: "Tesla M60 (16GB)", gpu_count: 2, vcpus: 24, ram_gb: 224, tier: GpuTier::Low, kwh_per_hr: 0.12 },
    GpuSpec { key: "nv48s_v3", gpu_name: "Tesla M60 (32GB)", gpu_count: 4, vcpus: 48, ram_gb: 448, tier: GpuTier::Low, kwh_per_hr: 0.12 },
];

/// Energy draw per GPU family, kWh per hour (vision snapshot reference data).
pub const KWH_PER_GPU_FAMILY: &[(&str, f64)] = &[
    ("v100", 0.30),
    ("t4", 0.07),
    ("a10", 0.15),
    ("a100", 0.40),
    ("h100", 0.70),
    ("mi25", 0.10),
    ("m60", 0.12),
];

/// Default energy draw when a SKU has no catalog entry.
pub const DEFAULT_KWH_PER_HR: f64 = 0.30;

/// Map an Azure SKU name to catalog specs.
///
/// Matching is case-insensitive containment; when several keys are contained
/// in the SKU, the longest one wins so the result is independent of table
/// order. Returns None for SKUs outside the catalog (those rows are dropped).
pub fn identify_gpu(sku: &str) -> Option<&'static GpuSpec> {
    let lowered = sku.to_lowercase();
    GPU_CATALOG
        .iter()
        .filter(|spec| lowered.contains(spec.key))
        .max_by_key(|spec| spec.key.len())
}

// ---------------------------------------------------------------------------
// Grid mix & emission factors
// ---------------------------------------------------------------------------

/// Generation shares of a regional grid (fractions of total supply).
///
/// `wind_max`/`solar_max` are the installed potential, scaled down by live
/// weather; `gas_base` is the floor the gas share never drops below half of.
#[derive(Debug, Clone, Copy)]
pub struct GridMix {
    pub nuclear: f64,
    pub hydro: f64,
    pub wind_max: f64,
    pub solar_max: f64,
    pub gas_base: f64,
    pub coal_base: f64,
}

/// Grid composition for regions without a live intensity API
/// (source: IEA, RTE, CBS annual generation statistics).
pub fn grid_mix(region_id: &str) -> Option<&'static GridMix> {
    const FRANCECENTRAL: GridMix = GridMix {
        nuclear: 0.70,
        hydro: 0.12,
        wind_max: 0.10,
        solar_max: 0.05,
        gas_base: 0.08,
        coal_base: 0.0,
    };
    const WESTEUROPE: GridMix = GridMix {
        nuclear: 0.03,
        hydro: 0.0,
        wind_max: 0.22,
        solar_max: 0.12,
        gas_base: 0.52,
        coal_base: 0.05,
    };
    match region_id {
        "francecentral" => Some(&FRANCECENTRAL),
        "westeurope" => Some(&WESTEUROPE),
        _ => None,
    }
}

/// Lifecycle emission factors in gCO2/kWh per generation source.
pub const EMISSION_FACTORS: &[(&str, f64)] = &[
    ("nuclear", 12.0),
    ("hydro", 24.0),
    ("wind", 11.0),
    ("solar", 45.0),
    ("gas", 490.0),
    ("coal", 820.0),
    ("biomass", 230.0),
    ("other", 300.0),
];

/// Emission factor for a generation source, defaulting to the "other" bucket.
pub fn emission_factor(source: &str) -> f64 {
    EMISSION_FACTORS
        .iter()
        .find(|(name, _)| *name == source)
        .map(|(_, factor)| *factor)
        .unwrap_or(300.0)
}

// ---------------------------------------------------------------------------
// Reference constants
// ---------------------------------------------------------------------------

/// Hard-coded conversion rate; not refreshed.
pub const EUR_USD: f64 = 0.92;

/// Power Usage Effectiveness multiplier applied to GPU energy draw.
pub const DATACENTER_PUE: f64 = 1.2;

/// Worst-case grid intensity used as the CO2 comparison baseline.
pub const WORST_CASE_GCO2_KWH: f64 = 500.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_gpu_exact_sku() {
        let spec = identify_gpu("Standard_NC6s_v3").expect("known SKU");
        assert_eq!(spec.gpu_name, "Tesla V100 (16GB)");
        assert_eq!(spec.ram_gb, 112);
        assert_eq!(spec.tier, GpuTier::High);
    }

    #[test]
    fn test_identify_gpu_case_insensitive() {
        assert!(identify_gpu("standard_nc24ads_a100_v4").is_none());
        assert!(identify_gpu("STANDARD_NC48ADS_A100_V4").is_some());
    }

    #[test]
    fn test_identify_gpu_unknown_sku() {
        assert!(identify_gpu("Standard_D4s_v5").is_none());
    }

    #[test]
    fn test_identify_gpu_longest_key_wins() {
        // "nc24rs_v3" contains no shorter catalog key, but make sure a SKU
        // containing two keys resolves to the longer one.
        let spec = identify_gpu("Standard_NC24rs_v3").expect("known SKU");
        assert_eq!(spec.key, "nc24rs_v3");
    }

    #[test]
    fn test_region_or_default_substitutes_unknown() {
        assert_eq!(region_or_default("mars-north-1").id, "francecentral");
        assert_eq!(region_or_default("uksouth").id, "uksouth");
    }

    #[test]
    fn test_neighbor_graph_is_union_of_cycles() {
        for region in REGIONS {
            for az in region.azs {
                // Every AZ has a neighbor, and following neighbors returns
                // to the starting AZ within the region's AZ count.
                let mut current = az.id;
                for _ in 0..region.azs.len() {
                    current = neighbor_az(current).expect("neighbor exists");
                }
                assert_eq!(current, az.id, "neighbor walk must cycle back");
            }
        }
    }

    #[test]
    fn test_neighbor_ring_fr_central() {
        assert_eq!(neighbor_az("fr-central-2"), Some("fr-central-3"));
        assert_eq!(neighbor_az("fr-central-3"), Some("fr-central-1"));
        assert_eq!(neighbor_az("unknown-az"), None);
    }

    #[test]
    fn test_grid_mix_only_for_model_regions() {
        assert!(grid_mix("francecentral").is_some());
        assert!(grid_mix("westeurope").is_some());
        assert!(grid_mix(LIVE_CARBON_REGION).is_none());
    }

    #[test]
    fn test_emission_factor_lookup() {
        assert_eq!(emission_factor("gas"), 490.0);
        assert_eq!(emission_factor("coal"), 820.0);
        assert_eq!(emission_factor("unknown-source"), 300.0);
    }

    #[test]
    fn test_catalog_kwh_matches_family_table() {
        let spec = identify_gpu("Standard_NC80adis_H100_v5").unwrap();
        let (_, family_kwh) = KWH_PER_GPU_FAMILY
            .iter()
            .find(|(name, _)| *name == "h100")
            .unwrap();
        assert_eq!(spec.kwh_per_hr, *family_kwh);
    }
}

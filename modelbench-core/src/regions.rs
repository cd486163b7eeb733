//! Named lat/lon regions used to mask variables before spatial statistics.
//!
//! A [`Region`] is a simple bounding box in degrees; a [`RegionRegistry`]
//! maps region names to boxes. The default registry carries `global` plus
//! the regions the bundled confrontations analyze.

use crate::errors::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A lat/lon bounding box in degrees.
///
/// Latitudes are in [-90, 90], longitudes in [-180, 180] east of the
/// antimeridian. A point is inside when both coordinates fall within the
/// closed bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Region {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// The whole globe.
    pub fn global() -> Self {
        Self::new(-90.0, 90.0, -180.0, 180.0)
    }

    /// Whether a point lies inside this region.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }
}

/// Registry of named regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionRegistry {
    regions: HashMap<String, Region>,
}

impl RegionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            regions: HashMap::new(),
        }
    }

    /// The default registry: `global` plus the regions used by the bundled
    /// confrontations.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        r.register("global", Region::global());
        r.register("amazon", Region::new(-14.0, 5.0, -75.0, -45.0));
        r
    }

    pub fn register(&mut self, name: &str, region: Region) {
        self.regions.insert(name.to_string(), region);
    }

    pub fn get(&self, name: &str) -> BenchResult<Region> {
        self.regions.get(name).copied().ok_or_else(|| {
            BenchError::Analysis(format!("region '{name}' is not in the region registry"))
        })
    }
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Global region registry seeded with [`RegionRegistry::with_defaults`].
pub static REGION_REGISTRY: LazyLock<RegionRegistry> =
    LazyLock::new(RegionRegistry::with_defaults);

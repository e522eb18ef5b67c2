//! Run configuration
//!
//! A flood run is configured once from a TOML document:
//!
//! ```toml
//! before = { start = "2023-07-01", end = "2023-08-01" }
//! during = { start = "2024-07-01", end = "2024-08-01" }
//!
//! [region]
//! name = "BGD"
//! crs = "EPSG:4326"
//! rings = [[[88.0, 21.0], [92.7, 21.0], [92.7, 26.6], [88.0, 26.6]]]
//!
//! [collection]
//! polarization = "VH"
//! track_ascending = 114
//! track_descending = 150
//!
//! [io]
//! catalog = "catalog.json"
//! points = "households.csv"
//! points_crs = "EPSG:4326"
//! output_dir = "out"
//! ```
//!
//! Every other section is optional and falls back to its defaults. Relative
//! paths in `[io]` resolve against the directory of the config file. Without
//! a `crs`, region rings and point coordinates are read in the CRS of the
//! imagery.

use std::fs;
use std::path::{Path, PathBuf};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sarflood_core::raster::Connectivity;
use sarflood_core::scene::{DateRange, OrbitDirection, SceneFilter};
use sarflood_core::store::SceneQuery;
use sarflood_core::vector::Region;
use sarflood_core::{CRS, Error, Result};
use crate::imagery::ChangeParams;
use crate::mask::{RefineParams, PERMANENT_WATER_MONTHS};
use crate::statistics::ZonalParams;
use crate::vector::PolygonizeParams;

/// Complete, validated configuration of a flood run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FloodConfig {
    /// Baseline window, end exclusive
    pub before: DateRange,
    /// Monitoring window, end exclusive
    pub during: DateRange,
    pub region: RegionConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub vectorize: VectorizeConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub io: IoConfig,
}

/// Area of interest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    /// Identifier used in export names
    pub name: String,
    /// CRS of the ring coordinates, e.g. `EPSG:4326`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    /// Exterior rings as `[x, y]` vertex lists
    pub rings: Vec<Vec<[f64; 2]>>,
}

/// Scene collection filters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionConfig {
    pub instrument_mode: String,
    pub polarization: String,
    /// Nominal pixel spacing in meters
    pub resolution: f64,
    pub track_ascending: u32,
    pub track_descending: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            instrument_mode: "IW".to_string(),
            polarization: "VH".to_string(),
            resolution: 10.0,
            track_ascending: 114,
            track_descending: 150,
        }
    }
}

/// Change detection and mask refinement settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Focal mean radius in map units
    pub smoothing_radius: f64,
    pub histogram_buckets: usize,
    pub min_connected_pixels: usize,
    pub max_slope_degrees: f64,
    /// Months per year of surface water that make a pixel permanent water
    pub permanent_water_months: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            smoothing_radius: 50.0,
            histogram_buckets: 255,
            min_connected_pixels: 8,
            max_slope_degrees: 10.0,
            permanent_water_months: PERMANENT_WATER_MONTHS,
        }
    }
}

/// Raster-to-polygon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VectorizeConfig {
    pub scale: f64,
    pub max_pixels: usize,
    pub best_effort: bool,
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        let params = PolygonizeParams::default();
        Self {
            scale: params.scale,
            max_pixels: params.max_pixels,
            best_effort: params.best_effort,
        }
    }
}

/// Point sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    pub batch_size: usize,
    /// Buffer radius in map units
    pub buffer_radius: f64,
    /// Date stamped on every record; the day of the run when absent
    pub analysis_date: Option<NaiveDate>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            buffer_radius: 15.0,
            analysis_date: None,
        }
    }
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IoConfig {
    /// Scene catalog manifest
    pub catalog: PathBuf,
    /// Ground-truth points CSV
    pub points: PathBuf,
    /// CRS of the point coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_crs: Option<String>,
    pub output_dir: PathBuf,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("catalog.json"),
            points: PathBuf::from("points.csv"),
            points_crs: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl FloodConfig {
    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text, &path.display().to_string())?;
        if let Some(dir) = path.parent() {
            config.io.resolve_against(dir);
        }
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str, source_name: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Parse {
            source_name: source_name.to_string(),
            line: e
                .span()
                .map_or(0, |span| text[..span.start.min(text.len())].matches('\n').count() + 1),
            reason: e.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run can succeed with
    pub fn validate(&self) -> Result<()> {
        self.before.validate("before")?;
        self.during.validate("during")?;
        self.region()?;
        for (name, crs) in [("region.crs", &self.region.crs), ("io.points_crs", &self.io.points_crs)] {
            if crs.as_deref().is_some_and(|c| c.trim().is_empty()) {
                return Err(Error::invalid_param(name, "", "must not be empty"));
            }
        }

        let c = &self.collection;
        if c.polarization.trim().is_empty() {
            return Err(Error::invalid_param("polarization", "", "must not be empty"));
        }
        positive("resolution", c.resolution)?;

        let p = &self.processing;
        positive("smoothing_radius", p.smoothing_radius)?;
        if p.histogram_buckets < 2 {
            return Err(Error::invalid_param(
                "histogram_buckets",
                p.histogram_buckets,
                "need at least 2 buckets",
            ));
        }
        if p.min_connected_pixels == 0 {
            return Err(Error::invalid_param("min_connected_pixels", 0, "must be at least 1"));
        }
        positive("max_slope_degrees", p.max_slope_degrees)?;
        positive("permanent_water_months", p.permanent_water_months)?;

        positive("vectorize.scale", self.vectorize.scale)?;
        if self.vectorize.max_pixels == 0 {
            return Err(Error::invalid_param("vectorize.max_pixels", 0, "must be at least 1"));
        }

        if self.sampling.batch_size == 0 {
            return Err(Error::invalid_param("batch_size", 0, "must be at least 1"));
        }
        positive("buffer_radius", self.sampling.buffer_radius)?;
        Ok(())
    }

    pub fn region(&self) -> Result<Region> {
        let rings: Vec<Vec<(f64, f64)>> = self
            .region
            .rings
            .iter()
            .map(|ring| ring.iter().map(|&[x, y]| (x, y)).collect())
            .collect();
        let region = Region::from_rings(&self.region.name, &rings)?;
        Ok(region.with_crs(self.region.crs.as_deref().map(CRS::parse)))
    }

    /// CRS of the ground-truth point coordinates, if configured
    pub fn points_crs(&self) -> Option<CRS> {
        self.io.points_crs.as_deref().map(CRS::parse)
    }

    /// Orbit track compared for a pass direction
    pub fn track(&self, direction: OrbitDirection) -> u32 {
        match direction {
            OrbitDirection::Ascending => self.collection.track_ascending,
            OrbitDirection::Descending => self.collection.track_descending,
        }
    }

    pub fn scene_filter(&self, range: DateRange, direction: OrbitDirection) -> SceneFilter {
        SceneFilter {
            range,
            direction,
            track: self.track(direction),
        }
    }

    pub fn scene_query<'a>(&'a self, region: &'a Region, range: DateRange, direction: OrbitDirection) -> SceneQuery<'a> {
        SceneQuery {
            sensor: &self.collection.instrument_mode,
            polarization: &self.collection.polarization,
            resolution: self.collection.resolution,
            region,
            range,
            direction,
            track: self.track(direction),
        }
    }

    pub fn change_params(&self) -> ChangeParams {
        ChangeParams {
            smoothing_radius: self.processing.smoothing_radius,
            histogram_buckets: self.processing.histogram_buckets,
        }
    }

    pub fn refine_params(&self) -> RefineParams {
        RefineParams {
            min_connected_pixels: self.processing.min_connected_pixels,
            max_slope_degrees: self.processing.max_slope_degrees,
            connectivity: Connectivity::Eight,
        }
    }

    pub fn polygonize_params(&self) -> PolygonizeParams {
        PolygonizeParams {
            scale: self.vectorize.scale,
            max_pixels: self.vectorize.max_pixels,
            best_effort: self.vectorize.best_effort,
        }
    }

    pub fn zonal_params(&self) -> ZonalParams {
        ZonalParams {
            buffer_radius: self.sampling.buffer_radius,
            batch_size: self.sampling.batch_size,
        }
    }
}

impl IoConfig {
    fn resolve_against(&mut self, dir: &Path) {
        for path in [&mut self.catalog, &mut self.points, &mut self.output_dir] {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::invalid_param(name, value, "must be positive"));
    }
    Ok(())
}

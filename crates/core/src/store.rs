//! Interfaces to the external data collaborators
//!
//! The flood pipeline never fetches imagery itself. It asks a [`RasterStore`]
//! for scenes and auxiliary layers and a [`PointSource`] for ground-truth
//! points. [`crate::io::Catalog`] and [`crate::io::CsvPointSource`] implement
//! them over local files.

use crate::error::Result;
use crate::raster::Raster;
use crate::scene::{DateRange, OrbitDirection, TimeSeries};
use crate::vector::{PointFeatureSet, Region};

/// Collection-level filters applied by the data store
#[derive(Debug, Clone)]
pub struct SceneQuery<'a> {
    /// Instrument mode, e.g. `IW`
    pub sensor: &'a str,
    /// Band that must be present, e.g. `VH`
    pub polarization: &'a str,
    /// Nominal pixel spacing in meters
    pub resolution: f64,
    pub region: &'a Region,
    pub range: DateRange,
    pub direction: OrbitDirection,
    pub track: u32,
}

/// Auxiliary layers consumed by the mask refiner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxiliaryLayer {
    /// Months per year with surface water
    WaterSeasonality,
    /// Elevation model in meters
    Elevation,
    /// Terrain slope in degrees
    Slope,
}

impl AuxiliaryLayer {
    pub fn name(&self) -> &'static str {
        match self {
            AuxiliaryLayer::WaterSeasonality => "water_seasonality",
            AuxiliaryLayer::Elevation => "elevation",
            AuxiliaryLayer::Slope => "slope",
        }
    }
}

/// Source of radar scenes and auxiliary rasters
pub trait RasterStore: Sync {
    /// Scenes matching the query, with only the queried band selected.
    fn query(&self, query: &SceneQuery<'_>) -> Result<TimeSeries>;

    /// Load an auxiliary layer, `None` if the store does not carry it.
    fn auxiliary_layer(&self, layer: AuxiliaryLayer) -> Result<Option<Raster<f64>>>;
}

/// Source of ground-truth points
pub trait PointSource {
    fn load_points(&self) -> Result<PointFeatureSet>;
}

//! # SarFlood Core
//!
//! Core types, traits and I/O for SAR flood mapping.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type, and `Image` for named bands
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling
//! - `Scene` and `TimeSeries`: dated radar acquisitions with orbit metadata
//! - `Region` and point sets for areas of interest and ground truth
//! - `RasterStore`/`PointSource`: the data collaborators of a run
//! - I/O for GeoTIFF, CSV and GeoJSON

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod scene;
pub mod store;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{Band, GeoTransform, Image, MASK_NODATA, Raster, RasterElement};
pub use scene::{DateRange, OrbitDirection, Scene, SceneFilter, TimeSeries};
pub use store::{AuxiliaryLayer, PointSource, RasterStore, SceneQuery};
pub use vector::{Feature, FeatureCollection, PointFeature, PointFeatureSet, Region};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Image, Raster, RasterElement};
    pub use crate::scene::{DateRange, OrbitDirection, Scene, TimeSeries};
    pub use crate::vector::Region;
    pub use crate::Algorithm;
}

/// Core trait for named raster algorithms.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}

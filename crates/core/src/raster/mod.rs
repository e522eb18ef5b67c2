//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod image;
mod neighborhood;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use image::{Band, Image};
pub use neighborhood::{CircularKernel, Connectivity};

/// No-data sentinel of binary `u8` masks
pub const MASK_NODATA: u8 = u8::MAX;

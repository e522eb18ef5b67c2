//! Statistical analysis algorithms for raster data
//!
//! - **focal**: Moving window (focal) statistics
//! - **histogram**: Equal-width value histograms
//! - **threshold**: Otsu threshold selection
//! - **zonal**: Batched sampling at buffered points

pub mod focal;
pub mod histogram;
pub mod threshold;
pub mod zonal;

pub use focal::{focal_mean, focal_statistics, median, FocalParams, FocalStatistic};
pub use histogram::Histogram;
pub use threshold::{otsu_from_histogram, otsu_threshold, OtsuParams, OtsuThreshold};
pub use zonal::{
    buffered_mean, BatchPlan, BatchSpec, ZonalBatch, ZonalParams, ZonalSampler, ZonalStatRecord,
    ZONAL_COLUMNS,
};

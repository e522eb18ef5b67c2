//! # SarFlood Algorithms
//!
//! Flood mapping from radar backscatter time series.
//!
//! ## Available Algorithm Categories
//!
//! - **statistics**: Focal mean, histograms, Otsu threshold, batched zonal sampling
//! - **imagery**: Mosaics, temporal composites, change detection
//! - **mask**: Connected components, permanent water, mask refinement
//! - **terrain**: Slope
//! - **vector**: Point buffers, polygonization
//! - **flood**: Run configuration, pipeline and export

pub mod flood;
pub mod imagery;
pub mod mask;
pub(crate) mod maybe_rayon;
pub mod statistics;
pub mod terrain;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::flood::{
        DirectoryExporter, ExportSink, FloodConfig, FloodPipeline, FloodResult, RunReport,
    };
    pub use crate::imagery::{
        baseline_composite, binarize, change_ratio, detect_change, mosaic, ChangeParams, Composite,
    };
    pub use crate::mask::{permanent_water, refine_mask, MaskRefiner, RefineParams, StageCounts};
    pub use crate::statistics::{
        focal_mean, otsu_threshold, BatchPlan, Histogram, OtsuParams, OtsuThreshold, ZonalParams,
        ZonalSampler,
    };
    pub use crate::terrain::{slope, Slope, SlopeParams};
    pub use crate::vector::{buffer_points, polygonize, BufferParams, PolygonizeParams};
    pub use sarflood_core::prelude::*;
}

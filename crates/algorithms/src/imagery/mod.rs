//! Imagery analysis algorithms
//!
//! Algorithms for radar time series:
//! - Mosaic: merge same-date tiles onto one grid
//! - Composite: smoothed per-pixel median of a scene selection
//! - Change detection: after/before ratio, Otsu threshold and binary mask

pub mod change_detection;
pub mod composite;
pub mod mosaic;

pub use change_detection::{
    binarize, change_ratio, detect_change, ChangeDetection, ChangeParams, RATIO_BAND,
};
pub use composite::{baseline_composite, temporal_median, Composite};
pub use mosaic::{mosaic, resample_nearest, warp_nearest};

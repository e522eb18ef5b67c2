//! Ratio change detection against a baseline
//!
//! A same-day mosaic is smoothed like the baseline, divided by it, and the
//! ratio is split into change/no-change with an Otsu threshold computed over
//! the region.

use chrono::NaiveDate;
use ndarray::Array2;
use tracing::debug;
use crate::imagery::mosaic::mosaic;
use crate::maybe_rayon::*;
use crate::statistics::focal::focal_mean;
use crate::statistics::threshold::{otsu_threshold, OtsuParams};
use sarflood_core::raster::{Image, Raster, MASK_NODATA};
use sarflood_core::scene::{DateRange, OrbitDirection, SceneFilter, SelectionSummary, TimeSeries};
use sarflood_core::vector::Region;
use sarflood_core::{Error, Result};

/// Band name of the ratio image handed to threshold selection
pub const RATIO_BAND: &str = "ratio";

/// Parameters for change detection
#[derive(Debug, Clone)]
pub struct ChangeParams {
    /// Focal mean radius in map units
    pub smoothing_radius: f64,
    /// Histogram buckets for the Otsu threshold
    pub histogram_buckets: usize,
}

impl Default for ChangeParams {
    fn default() -> Self {
        Self {
            smoothing_radius: 50.0,
            histogram_buckets: 255,
        }
    }
}

/// Outcome of change detection for one acquisition date
#[derive(Debug, Clone)]
pub struct ChangeDetection {
    /// `after / before`, NaN where undefined
    pub ratio: Raster<f64>,
    /// Otsu threshold of the ratio inside the region
    pub threshold: f64,
    /// 1 where `ratio > threshold`, 0 elsewhere, [`MASK_NODATA`] where the ratio is invalid
    pub mask: Raster<u8>,
    /// Tiles that went into the mosaic
    pub summary: SelectionSummary,
}

/// Pixel-wise `after / before`
///
/// A pixel is NaN when either input is invalid, the baseline is zero, or the
/// quotient is not finite.
///
/// # Errors
/// [`Error::ShapeMismatch`] if the rasters are not on the same grid.
pub fn change_ratio(after: &Raster<f64>, before: &Raster<f64>) -> Result<Raster<f64>> {
    before.ensure_aligned(after, "after")?;
    let (rows, cols) = before.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| match (after.valid_at(row, col), before.valid_at(row, col)) {
                    (Some(a), Some(b)) if b != 0.0 => {
                        let q = a / b;
                        if q.is_finite() { q } else { f64::NAN }
                    }
                    _ => f64::NAN,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    before.with_data(data, Some(f64::NAN))
}

/// Binary change mask: 1 where `value > threshold`
pub fn binarize(raster: &Raster<f64>, threshold: f64) -> Raster<u8> {
    let mut mask = raster.like(0u8, Some(MASK_NODATA));
    for (dst, &v) in mask.data_mut().iter_mut().zip(raster.data().iter()) {
        *dst = if raster.is_nodata(v) {
            MASK_NODATA
        } else if v > threshold {
            1
        } else {
            0
        };
    }
    mask
}

/// Detect change on one acquisition date against a smoothed baseline
///
/// # Errors
/// * [`Error::NoImagery`] if no tile matches the date and orbit geometry
/// * [`Error::EmptyHistogram`] if the ratio has no valid pixel in `region`
/// * [`Error::ShapeMismatch`] if tiles cannot be placed on the baseline grid
pub fn detect_change(
    series: &TimeSeries,
    date: NaiveDate,
    direction: OrbitDirection,
    track: u32,
    baseline: &Raster<f64>,
    region: &Region,
    params: &ChangeParams,
) -> Result<ChangeDetection> {
    let filter = SceneFilter {
        range: DateRange::day(date),
        direction,
        track,
    };
    let tiles = series.require(&filter)?;
    let summary = SelectionSummary::of(&tiles);
    debug!(%date, %direction, tiles = summary.count, "mosaicking");

    let after = mosaic(&tiles, Some(baseline))?;
    let after = focal_mean(&after, params.smoothing_radius)?;
    let ratio = change_ratio(&after, baseline)?;

    let image = Image::single(RATIO_BAND, ratio);
    let threshold = otsu_threshold(
        &image,
        region,
        &OtsuParams {
            max_buckets: params.histogram_buckets,
        },
    )?;
    let ratio = image.single_band()?.raster.clone();
    let mask = binarize(&ratio, threshold);

    Ok(ChangeDetection {
        ratio,
        threshold,
        mask,
        summary,
    })
}

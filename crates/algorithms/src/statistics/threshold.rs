//! Otsu threshold selection
//!
//! The threshold is chosen from a histogram of the band values inside a
//! region. For every split index the between-class variance
//!
//! ```text
//! n_below * (mean_below - mean)^2 + n_above * (mean_above - mean)^2
//! ```
//!
//! is evaluated and the bucket mean that closes the lower class at the best
//! split is returned. Ties go to the largest split.

use super::histogram::Histogram;
use sarflood_core::raster::Image;
use sarflood_core::vector::Region;
use sarflood_core::{Algorithm, Error, Result};

/// Parameters for Otsu thresholding
#[derive(Debug, Clone)]
pub struct OtsuParams {
    /// Number of histogram buckets over the value range
    pub max_buckets: usize,
}

impl Default for OtsuParams {
    fn default() -> Self {
        Self { max_buckets: 255 }
    }
}

/// Otsu threshold algorithm
#[derive(Debug, Clone, Default)]
pub struct OtsuThreshold;

impl Algorithm for OtsuThreshold {
    type Input = (Image, Region);
    type Output = f64;
    type Params = OtsuParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Otsu"
    }

    fn description(&self) -> &'static str {
        "Binarization threshold maximizing between-class variance of a single-band image inside a region"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (image, region) = input;
        otsu_threshold(&image, &region, &params)
    }
}

/// Otsu threshold of a single-band image restricted to a region
///
/// Only valid pixels whose centers fall inside `region` are counted.
///
/// # Errors
/// * [`Error::InvalidInput`] if the image does not have exactly one band
/// * [`Error::EmptyHistogram`] if the region holds no valid pixel
pub fn otsu_threshold(image: &Image, region: &Region, params: &OtsuParams) -> Result<f64> {
    if params.max_buckets == 0 {
        return Err(Error::invalid_param("histogram_buckets", 0, "must be at least 1"));
    }

    let band = image.single_band()?;
    let raster = &band.raster;
    let inside = region.mask_for(raster);

    let values = raster
        .data()
        .iter()
        .zip(inside.iter())
        .filter(|&(&v, &keep)| keep && !raster.is_nodata(v))
        .map(|(&v, _)| v);

    let histogram = Histogram::from_values(values, params.max_buckets).ok_or_else(|| Error::EmptyHistogram {
        band: band.name.clone(),
        region: region.name.clone(),
    })?;

    Ok(otsu_from_histogram(&histogram))
}

/// Otsu threshold of a non-empty histogram
pub fn otsu_from_histogram(histogram: &Histogram) -> f64 {
    let counts = &histogram.counts;
    let means = &histogram.bucket_means;
    let n = counts.len();

    let total: f64 = counts.iter().map(|&c| c as f64).sum();
    let sum: f64 = counts.iter().zip(means).map(|(&c, &m)| c as f64 * m).sum();
    let global_mean = sum / total;

    let mut best: Option<(f64, usize)> = None;
    let mut count_below = 0.0;
    let mut sum_below = 0.0;

    for i in 1..n {
        count_below += counts[i - 1] as f64;
        sum_below += counts[i - 1] as f64 * means[i - 1];
        let count_above = total - count_below;

        // Variance is undefined with an empty class
        if count_below == 0.0 || count_above == 0.0 {
            continue;
        }

        let mean_below = sum_below / count_below;
        let mean_above = (sum - sum_below) / count_above;
        let bss = count_below * (mean_below - global_mean).powi(2)
            + count_above * (mean_above - global_mean).powi(2);

        if best.is_none_or(|(b, _)| bss >= b) {
            best = Some((bss, i));
        }
    }

    match best {
        Some((_, i)) => means[i - 1],
        // A single occupied bucket has no split
        None => counts
            .iter()
            .position(|&c| c > 0)
            .map(|k| means[k])
            .unwrap_or(histogram.min),
    }
}

//! Focal (moving window) statistics over circular kernels
//!
//! The window is a disk whose radius is given in map units, so the same
//! configuration smooths 10 m and 20 m products over the same ground
//! footprint. Invalid cells inside the window are ignored.

use ndarray::Array2;
use crate::maybe_rayon::*;
use sarflood_core::raster::{CircularKernel, Raster};
use sarflood_core::{Error, Result};

/// Available focal statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocalStatistic {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Median value
    Median,
}

/// Parameters for focal statistics
#[derive(Debug, Clone)]
pub struct FocalParams {
    /// Disk radius in map units (meters for projected grids)
    pub radius: f64,
    /// Statistic to compute
    pub statistic: FocalStatistic,
}

impl Default for FocalParams {
    fn default() -> Self {
        Self {
            radius: 50.0,
            statistic: FocalStatistic::Mean,
        }
    }
}

/// Compute focal statistics on a raster
///
/// Each output cell holds the statistic of the valid input cells whose
/// centers lie within `params.radius` of its own center. Cells whose window
/// holds no valid value are NaN.
///
/// # Arguments
/// * `raster` - Input raster
/// * `params` - Focal parameters (radius in map units, statistic)
pub fn focal_statistics(raster: &Raster<f64>, params: &FocalParams) -> Result<Raster<f64>> {
    if !params.radius.is_finite() || params.radius < 0.0 {
        return Err(Error::invalid_param(
            "smoothing_radius",
            params.radius,
            "must be a finite, non-negative distance",
        ));
    }

    let kernel = CircularKernel::from_map_units(params.radius, raster.cell_size());
    let (rows, cols) = raster.shape();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut values: Vec<f64> = Vec::with_capacity(kernel.len());

            for (col, out) in row_data.iter_mut().enumerate() {
                values.clear();

                for &(dr, dc) in kernel.offsets() {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;

                    if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                        let v = unsafe { raster.get_unchecked(nr as usize, nc as usize) };
                        if !raster.is_nodata(v) {
                            values.push(v);
                        }
                    }
                }

                if let Some(v) = compute_statistic(&mut values, params.statistic) {
                    *out = v;
                }
            }

            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    raster.with_data(data, Some(f64::NAN))
}

/// Circular focal mean, the speckle filter applied before change detection
pub fn focal_mean(raster: &Raster<f64>, radius: f64) -> Result<Raster<f64>> {
    focal_statistics(
        raster,
        &FocalParams {
            radius,
            statistic: FocalStatistic::Mean,
        },
    )
}

fn compute_statistic(values: &mut [f64], stat: FocalStatistic) -> Option<f64> {
    match stat {
        FocalStatistic::Mean => {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        FocalStatistic::Median => median(values),
    }
}

/// Median of a value slice; an even count averages the two middle values.
///
/// The slice is reordered. Returns `None` for an empty slice.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sarflood_core::GeoTransform;

    fn raster_10m(size: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(size, size, value);
        r.set_transform(GeoTransform::new(0.0, size as f64 * 10.0, 10.0, -10.0));
        r
    }

    fn gradient_raster(size: usize) -> Raster<f64> {
        let mut r = raster_10m(size, 0.0);
        for row in 0..size {
            for col in 0..size {
                r.set(row, col, (row * size + col) as f64).unwrap();
            }
        }
        r
    }

    #[test]
    fn test_focal_mean_uniform() {
        let r = raster_10m(15, 0.04);
        let result = focal_mean(&r, 50.0).unwrap();
        for &v in result.data().iter() {
            assert_relative_eq!(v, 0.04, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_focal_mean_radius_in_map_units() {
        // 10 m radius on 10 m cells: center plus 4 edge neighbors
        let r = gradient_raster(5);
        let result = focal_mean(&r, 10.0).unwrap();
        // (2,2)=12, neighbors 7, 11, 13, 17
        assert_relative_eq!(result.get(2, 2).unwrap(), 12.0, epsilon = 1e-12);
        // Corner (0,0)=0 with neighbors 1 and 5
        assert_relative_eq!(result.get(0, 0).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_focal_mean_ignores_nodata() {
        let mut r = raster_10m(5, 1.0);
        r.set(2, 1, f64::NAN).unwrap();
        r.set(2, 3, 3.0).unwrap();
        let result = focal_mean(&r, 10.0).unwrap();
        // Valid window around (2,2): 1, 1, 1, 3
        assert_relative_eq!(result.get(2, 2).unwrap(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_focal_all_invalid_window_is_nan() {
        let r = raster_10m(3, f64::NAN);
        let result = focal_mean(&r, 20.0).unwrap();
        assert!(result.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_focal_median() {
        let r = gradient_raster(10);
        let result = focal_statistics(&r, &FocalParams {
            radius: 15.0,
            statistic: FocalStatistic::Median,
        }).unwrap();
        // 3x3 window around (5,5)=55 is symmetric, median is 55
        assert_relative_eq!(result.get(5, 5).unwrap(), 55.0, epsilon = 1e-12);
    }

    #[test]
    fn test_focal_negative_radius_error() {
        let r = raster_10m(5, 1.0);
        assert!(focal_mean(&r, -1.0).is_err());
        assert!(focal_mean(&r, f64::NAN).is_err());
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut [5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(&mut Vec::new()), None);
    }
}

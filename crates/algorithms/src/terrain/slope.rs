//! Slope calculation from DEMs
//!
//! Calculates the rate of change of elevation using the Horn (1981) method,
//! which uses a 3x3 neighborhood to compute partial derivatives. Slope is
//! reported in degrees, the unit of the flood mask's terrain limit.
//!
//! Global elevation products are usually gridded in longitude/latitude. For
//! those the cell spacing is converted to meters row by row on the WGS84
//! ellipsoid (dx = N cos(lat) dlon, dy = M dlat).

use ndarray::Array2;
use crate::maybe_rayon::*;
use sarflood_core::crs::cell_dimensions;
use sarflood_core::raster::Raster;
use sarflood_core::{Algorithm, CRS, Error, Result};

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    /// Elevation units per meter of ground distance (default 1.0)
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self { z_factor: 1.0 }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Calculate slope in degrees from a DEM using Horn's method"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, params)
    }
}

/// Calculate slope in degrees from a DEM
///
/// Uses Horn's (1981) method with a 3x3 neighborhood:
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * dx)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * dy)
/// slope = atan(sqrt(dz/dx² + dz/dy²))
///
/// `dx` and `dy` are the cell's ground spacing in meters when the DEM has a
/// geographic CRS, and its cell size in map units otherwise.
///
/// Neighbors outside the grid or without data take the center value, so edge
/// cells get a slope instead of no-data. Cells without elevation stay NaN.
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    if !(params.z_factor.is_finite() && params.z_factor > 0.0) {
        return Err(Error::invalid_param("z_factor", params.z_factor, "must be positive"));
    }

    let (rows, cols) = dem.shape();
    let spacing = row_spacing(dem, params.z_factor);

    // Process rows in parallel
    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let (dx, dy) = spacing[row];

            for (col, out) in row_data.iter_mut().enumerate() {
                let Some(e) = dem.valid_at(row, col) else {
                    continue;
                };

                let z = |dr: isize, dc: isize| {
                    row.checked_add_signed(dr)
                        .zip(col.checked_add_signed(dc))
                        .and_then(|(r, c)| dem.valid_at(r, c))
                        .unwrap_or(e)
                };

                let (a, b, c) = (z(-1, -1), z(-1, 0), z(-1, 1));
                let (d, f) = (z(0, -1), z(0, 1));
                let (g, h, i) = (z(1, -1), z(1, 0), z(1, 1));

                // Horn's method
                let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
                let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy);

                *out = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
            }

            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    dem.with_data(data, Some(f64::NAN))
}

/// Ground spacing `(dx, dy)` of every row, scaled by the z-factor
fn row_spacing(dem: &Raster<f64>, z_factor: f64) -> Vec<(f64, f64)> {
    let tf = dem.transform();
    let geographic = dem.crs().is_some_and(CRS::is_geographic);

    (0..dem.rows())
        .map(|row| {
            let (dx, dy) = if geographic {
                let lat = tf.origin_y + (row as f64 + 0.5) * tf.pixel_height;
                cell_dimensions(lat, tf.pixel_width, tf.pixel_height)
            } else {
                (tf.pixel_width.abs(), tf.pixel_height.abs())
            };
            (dx * z_factor, dy * z_factor)
        })
        .collect()
}

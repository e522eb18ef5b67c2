//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced single-band 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid with associated
/// geographic metadata (transform and CRS). Cells equal to the no-data
/// value (or `NaN` for float rasters) are invalid.
///
/// # Example
///
/// ```ignore
/// use sarflood_core::Raster;
///
/// let mut raster: Raster<f64> = Raster::new(100, 100);
/// raster.set(10, 20, 0.042)?;
/// let value = raster.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: Option<CRS>,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from existing row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a raster on the same grid (transform and CRS) from new data
    pub fn with_data<U: RasterElement>(&self, data: Array2<U>, nodata: Option<U>) -> Result<Raster<U>> {
        if data.dim() != self.shape() {
            let (ar, ac) = data.dim();
            return Err(Error::ShapeMismatch {
                layer: "derived".into(),
                reason: format!("expected {}x{}, got {}x{}", self.rows(), self.cols(), ar, ac),
            });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata,
        })
    }

    /// Create a raster on the same grid, filled with a value
    pub fn like<U: RasterElement>(&self, fill_value: U, nodata: Option<U>) -> Raster<U> {
        Raster {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Coordinate conversion

    /// Convert pixel coordinates to geographic coordinates (pixel center)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Integer (row, col) of the pixel containing a geographic point
    pub fn pixel_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.transform.geo_to_pixel(x, y);
        if !(col.is_finite() && row.is_finite()) || col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        (row < self.rows() && col < self.cols()).then_some((row, col))
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Cell value if it is valid
    pub fn valid_at(&self, row: usize, col: usize) -> Option<T> {
        let value = *self.data.get((row, col))?;
        (!self.is_nodata(value)).then_some(value)
    }

    /// Number of valid cells
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// Number of valid cells satisfying a predicate
    pub fn count_where(&self, mut pred: impl FnMut(T) -> bool) -> usize {
        self.data
            .iter()
            .filter(|&&v| !self.is_nodata(v) && pred(v))
            .count()
    }

    /// Fail with [`Error::ShapeMismatch`] unless `other` lies on the same
    /// grid (dimensions, transform and CRS).
    pub fn ensure_aligned<U: RasterElement>(&self, other: &Raster<U>, layer: &str) -> Result<()> {
        let mismatch = |reason: String| Error::ShapeMismatch {
            layer: layer.to_string(),
            reason,
        };

        if self.shape() != other.shape() {
            return Err(mismatch(format!(
                "dimensions {}x{} vs {}x{}",
                other.rows(),
                other.cols(),
                self.rows(),
                self.cols()
            )));
        }
        if !self.transform.same_grid(other.transform()) {
            return Err(mismatch("geotransform differs".into()));
        }
        if !CRS::compatible(self.crs(), other.crs()) {
            return Err(mismatch(format!(
                "CRS {} vs {}",
                other.crs().map(|c| c.identifier()).unwrap_or_default(),
                self.crs().map(|c| c.identifier()).unwrap_or_default()
            )));
        }
        Ok(())
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for v in self.data.iter().filter(|&&v| !self.is_nodata(v)).filter_map(|v| v.to_f64()) {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            count += 1;
        }

        let (min, max, mean) = if count > 0 {
            (Some(min), Some(max), Some(sum / count as f64))
        } else {
            (None, None, None)
        };

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_statistics_skip_nodata() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f64).unwrap();
            }
        }
        raster.set(9, 9, f64::NAN).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(98.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nodata_count, 1);
    }

    #[test]
    fn test_pixel_at() {
        let mut raster: Raster<u8> = Raster::new(4, 4);
        raster.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        assert_eq!(raster.pixel_at(15.0, 35.0), Some((0, 1)));
        assert_eq!(raster.pixel_at(39.9, 0.1), Some((3, 3)));
        assert_eq!(raster.pixel_at(-1.0, 35.0), None);
        assert_eq!(raster.pixel_at(45.0, 35.0), None);
    }

    #[test]
    fn test_ensure_aligned() {
        let mut a: Raster<u8> = Raster::new(5, 5);
        a.set_transform(GeoTransform::new(0.0, 50.0, 10.0, -10.0));
        a.set_crs(Some(CRS::from_epsg(32646)));

        let b = a.like(0.0_f64, Some(f64::NAN));
        assert!(a.ensure_aligned(&b, "slope").is_ok());

        let mut shifted = b.clone();
        shifted.set_transform(GeoTransform::new(10.0, 50.0, 10.0, -10.0));
        assert!(matches!(
            a.ensure_aligned(&shifted, "slope"),
            Err(Error::ShapeMismatch { .. })
        ));

        let mut other_crs = b.clone();
        other_crs.set_crs(Some(CRS::wgs84()));
        assert!(a.ensure_aligned(&other_crs, "slope").is_err());

        let small: Raster<f64> = Raster::new(4, 5);
        assert!(a.ensure_aligned(&small, "water").is_err());
    }
}

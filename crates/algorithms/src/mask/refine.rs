//! Flood mask refinement
//!
//! Three suppressions run in order on a binary change mask:
//!
//! 1. pixels flagged as permanent water are cleared,
//! 2. 8-connected groups smaller than `min_connected_pixels` are cleared,
//! 3. pixels with slope at or above `max_slope_degrees` (or unknown slope)
//!    are cleared.
//!
//! Afterwards every invalid pixel and every pixel outside the region is set
//! to 0, so the result holds only 0 and 1.

use tracing::debug;
use crate::mask::components::{is_positive, label_components};
use sarflood_core::raster::{Connectivity, Raster};
use sarflood_core::vector::Region;
use sarflood_core::{Error, Result};

/// Parameters for mask refinement
#[derive(Debug, Clone)]
pub struct RefineParams {
    /// Smallest connected group that survives
    pub min_connected_pixels: usize,
    /// Slope (degrees) from which pixels are cleared
    pub max_slope_degrees: f64,
    /// Adjacency used for group sizes
    pub connectivity: Connectivity,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            min_connected_pixels: 8,
            max_slope_degrees: 10.0,
            connectivity: Connectivity::Eight,
        }
    }
}

/// Positive pixel count after each refinement stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageCounts {
    pub input: usize,
    pub after_water: usize,
    pub after_connectivity: usize,
    pub after_slope: usize,
    /// After clearing pixels outside the region
    pub output: usize,
}

impl StageCounts {
    /// Counts in stage order
    pub fn as_array(&self) -> [usize; 5] {
        [
            self.input,
            self.after_water,
            self.after_connectivity,
            self.after_slope,
            self.output,
        ]
    }
}

/// Refined flood mask with its stage counts
#[derive(Debug, Clone)]
pub struct RefinedMask {
    /// 0/1 mask without no-data
    pub mask: Raster<u8>,
    pub counts: StageCounts,
}

/// Mask refiner bound to the auxiliary layers of a run
#[derive(Debug, Clone, Copy)]
pub struct MaskRefiner<'a> {
    permanent_water: &'a Raster<u8>,
    slope: &'a Raster<f64>,
    params: &'a RefineParams,
}

impl<'a> MaskRefiner<'a> {
    pub fn new(permanent_water: &'a Raster<u8>, slope: &'a Raster<f64>, params: &'a RefineParams) -> Self {
        Self {
            permanent_water,
            slope,
            params,
        }
    }

    /// Refine a change mask inside `region`.
    ///
    /// # Errors
    /// [`Error::ShapeMismatch`] if either auxiliary layer is not on the grid
    /// of `change`.
    pub fn refine(&self, change: &Raster<u8>, region: &Region) -> Result<RefinedMask> {
        refine_mask(change, self.permanent_water, self.slope, region, self.params)
    }
}

fn positive_count(mask: &Raster<u8>) -> usize {
    mask.count_where(|v| v != 0)
}

/// Apply the water, connectivity and slope suppressions to a change mask.
///
/// # Errors
/// [`Error::ShapeMismatch`] if either auxiliary layer is not on the grid of
/// `change`.
pub fn refine_mask(
    change: &Raster<u8>,
    permanent_water: &Raster<u8>,
    slope: &Raster<f64>,
    region: &Region,
    params: &RefineParams,
) -> Result<RefinedMask> {
    change.ensure_aligned(permanent_water, "permanent_water")?;
    change.ensure_aligned(slope, "slope")?;
    if params.min_connected_pixels == 0 {
        return Err(Error::invalid_param("min_connected_pixels", 0, "must be at least 1"));
    }

    let (rows, cols) = change.shape();
    let mut mask = change.clone();
    let input = positive_count(&mask);

    // Stage 1: permanent water
    for row in 0..rows {
        for col in 0..cols {
            if permanent_water.valid_at(row, col).is_some_and(|w| w != 0) && is_positive(&mask, row, col) {
                mask.data_mut()[[row, col]] = 0;
            }
        }
    }
    let after_water = positive_count(&mask);

    // Stage 2: small groups
    let components = label_components(&mask, params.connectivity);
    for row in 0..rows {
        for col in 0..cols {
            let size = components.size_at(row, col);
            if size > 0 && size < params.min_connected_pixels {
                mask.data_mut()[[row, col]] = 0;
            }
        }
    }
    let after_connectivity = positive_count(&mask);

    // Stage 3: steep or unknown terrain
    for row in 0..rows {
        for col in 0..cols {
            let steep = slope
                .valid_at(row, col)
                .is_none_or(|s| s >= params.max_slope_degrees);
            if steep && is_positive(&mask, row, col) {
                mask.data_mut()[[row, col]] = 0;
            }
        }
    }
    let after_slope = positive_count(&mask);

    // Only 0 and 1 leave this function
    let inside = region.mask_for(&mask);
    for ((row, col), v) in mask.data_mut().indexed_iter_mut() {
        let valid_positive = *v == 1;
        *v = u8::from(valid_positive && inside[[row, col]]);
    }
    mask.set_nodata(None);
    let output = positive_count(&mask);

    let counts = StageCounts {
        input,
        after_water,
        after_connectivity,
        after_slope,
        output,
    };
    debug!(?counts, "mask refined");

    Ok(RefinedMask { mask, counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sarflood_core::raster::{GeoTransform, MASK_NODATA};

    fn grid<T: sarflood_core::raster::RasterElement>(mut r: Raster<T>) -> Raster<T> {
        r.set_transform(GeoTransform::new(0.0, r.rows() as f64 * 10.0, 10.0, -10.0));
        r
    }

    fn mask_from(rows: &[&str]) -> Raster<u8> {
        let cols = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|r| r.chars().map(|ch| match ch {
                '#' => 1,
                '?' => MASK_NODATA,
                _ => 0,
            }))
            .collect();
        let mut mask = grid(Raster::from_vec(data, rows.len(), cols).unwrap());
        mask.set_nodata(Some(MASK_NODATA));
        mask
    }

    fn no_water(like: &Raster<u8>) -> Raster<u8> {
        like.like(MASK_NODATA, Some(MASK_NODATA))
    }

    fn flat(like: &Raster<u8>) -> Raster<f64> {
        like.like(0.0, Some(f64::NAN))
    }

    fn region_of(r: &Raster<u8>) -> Region {
        Region::from_bounds("aoi", r.bounds())
    }

    #[test]
    fn test_small_groups_dropped() {
        // 20-pixel block and an isolated 3-pixel group
        let change = mask_from(&[
            ".........",
            ".#####...",
            ".#####...",
            ".#####...",
            ".#####...",
            ".........",
            "......##.",
            ".......#.",
        ]);
        let refined = refine_mask(&change, &no_water(&change), &flat(&change), &region_of(&change), &RefineParams::default())
            .unwrap();

        assert_eq!(refined.counts.input, 23);
        assert_eq!(refined.counts.after_connectivity, 20);
        assert_eq!(refined.mask.get(1, 1).unwrap(), 1);
        assert_eq!(refined.mask.get(6, 6).unwrap(), 0);
    }

    #[test]
    fn test_group_of_exactly_min_size_kept() {
        let change = mask_from(&[
            "####......",
            "####......",
        ]);
        let refined = refine_mask(&change, &no_water(&change), &flat(&change), &region_of(&change), &RefineParams::default())
            .unwrap();
        assert_eq!(refined.counts.output, 8);
    }

    #[test]
    fn test_water_then_connectivity() {
        // Water splits a 10-pixel strip into groups too small to keep
        let change = mask_from(&[
            "##########",
        ]);
        let mut water = no_water(&change);
        water.set(0, 4, 1).unwrap();
        water.set(0, 5, 1).unwrap();

        let refined = refine_mask(&change, &water, &flat(&change), &region_of(&change), &RefineParams::default())
            .unwrap();
        assert_eq!(refined.counts.after_water, 8);
        assert_eq!(refined.counts.after_connectivity, 0);
    }

    #[test]
    fn test_slope_and_nodata_cleared() {
        let change = mask_from(&[
            "#####",
            "#####",
            "##?##",
        ]);
        let mut slope = flat(&change);
        slope.set(0, 0, 10.0).unwrap();
        slope.set(0, 1, 9.99).unwrap();
        slope.set(0, 2, f64::NAN).unwrap();

        let refined = refine_mask(&change, &no_water(&change), &slope, &region_of(&change), &RefineParams::default())
            .unwrap();

        assert_eq!(refined.counts.after_connectivity, 14);
        assert_eq!(refined.counts.after_slope, 12);
        assert_eq!(refined.mask.get(0, 0).unwrap(), 0);
        assert_eq!(refined.mask.get(0, 1).unwrap(), 1);
        assert_eq!(refined.mask.get(0, 2).unwrap(), 0);
        // Former no-data is now an explicit 0
        assert_eq!(refined.mask.get(2, 2).unwrap(), 0);
        assert_eq!(refined.mask.nodata(), None);
        assert!(refined.mask.data().iter().all(|&v| v <= 1));
    }

    #[test]
    fn test_outside_region_cleared() {
        let change = mask_from(&[
            "##########",
            "##########",
        ]);
        // Left half only
        let region = Region::from_bounds("west", (0.0, 0.0, 50.0, 20.0));
        let refined = refine_mask(&change, &no_water(&change), &flat(&change), &region, &RefineParams::default())
            .unwrap();
        assert_eq!(refined.counts.after_slope, 20);
        assert_eq!(refined.counts.output, 10);
    }

    #[test]
    fn test_counts_non_increasing_and_idempotent() {
        let change = mask_from(&[
            "###...#...",
            "###...##..",
            "###.......",
            "......####",
            "......####",
        ]);
        let mut water = no_water(&change);
        water.set(0, 0, 1).unwrap();
        let slope = flat(&change);
        let region = region_of(&change);
        let params = RefineParams::default();

        let once = refine_mask(&change, &water, &slope, &region, &params).unwrap();
        let counts = once.counts.as_array();
        assert!(counts.windows(2).all(|w| w[1] <= w[0]), "{:?}", counts);

        let twice = refine_mask(&once.mask, &water, &slope, &region, &params).unwrap();
        assert_eq!(once.mask.data(), twice.mask.data());
    }

    #[test]
    fn test_misaligned_layers_rejected() {
        let change = mask_from(&["####", "####"]);
        let small: Raster<f64> = grid(Raster::new(1, 4));
        let err = refine_mask(&change, &no_water(&change), &small, &region_of(&change), &RefineParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}

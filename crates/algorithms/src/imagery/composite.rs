//! Temporal compositing of a baseline image
//!
//! The baseline is the per-pixel median over every scene matching a filter,
//! smoothed with a circular focal mean to suppress speckle.

use ndarray::Array2;
use tracing::debug;
use crate::imagery::mosaic::resample_nearest;
use crate::maybe_rayon::*;
use crate::statistics::focal::{focal_mean, median};
use sarflood_core::raster::Raster;
use sarflood_core::scene::{Scene, SceneFilter, SelectionSummary, TimeSeries};
use sarflood_core::{Error, Result};

/// Smoothed baseline plus the selection it was built from
#[derive(Debug, Clone)]
pub struct Composite {
    pub raster: Raster<f64>,
    pub summary: SelectionSummary,
}

/// Per-pixel median across scenes, on the grid of the first scene
///
/// Invalid samples are ignored; a pixel invalid in every scene stays NaN.
pub fn temporal_median(scenes: &[&Scene]) -> Result<Raster<f64>> {
    let Some(first) = scenes.first() else {
        return Err(Error::NoImagery {
            what: "median of zero scenes".into(),
        });
    };
    let grid = &first.image.single_band()?.raster;
    let layers = scenes
        .iter()
        .map(|s| resample_nearest(&s.image.single_band()?.raster, grid))
        .collect::<Result<Vec<_>>>()?;

    let (rows, cols) = grid.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut samples = Vec::with_capacity(layers.len());
            (0..cols)
                .map(|col| {
                    samples.clear();
                    samples.extend(layers.iter().filter_map(|l| l.valid_at(row, col)));
                    median(&mut samples).unwrap_or(f64::NAN)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    grid.with_data(data, Some(f64::NAN))
}

/// Build the smoothed baseline for one orbit geometry and date range
///
/// # Errors
/// [`Error::NoImagery`] if no scene matches `filter`.
pub fn baseline_composite(series: &TimeSeries, filter: &SceneFilter, smoothing_radius: f64) -> Result<Composite> {
    let scenes = series.require(filter)?;
    let summary = SelectionSummary::of(&scenes);
    debug!(tiles = summary.count, span = %summary.span(), %filter, "building baseline");

    let median = temporal_median(&scenes)?;
    let raster = focal_mean(&median, smoothing_radius)?;
    Ok(Composite { raster, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use sarflood_core::raster::{GeoTransform, Image};
    use sarflood_core::scene::{DateRange, OrbitDirection};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 7, d).unwrap()
    }

    fn scene(day: u32, direction: OrbitDirection, track: u32, values: Vec<f64>) -> Scene {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        Scene {
            id: format!("S1_{}", day),
            date: date(day),
            direction,
            track,
            image: Image::single("VH", r),
        }
    }

    fn filter() -> SceneFilter {
        SceneFilter {
            range: DateRange::new(date(1), date(31)).unwrap(),
            direction: OrbitDirection::Ascending,
            track: 114,
        }
    }

    #[test]
    fn test_median_ignores_nodata() {
        let a = scene(2, OrbitDirection::Ascending, 114, vec![1.0, 4.0, f64::NAN, f64::NAN]);
        let b = scene(14, OrbitDirection::Ascending, 114, vec![3.0, 2.0, 5.0, f64::NAN]);
        let c = scene(26, OrbitDirection::Ascending, 114, vec![2.0, f64::NAN, 7.0, f64::NAN]);
        let m = temporal_median(&[&a, &b, &c]).unwrap();

        assert_relative_eq!(m.get(0, 0).unwrap(), 2.0);
        assert_relative_eq!(m.get(0, 1).unwrap(), 3.0);
        assert_relative_eq!(m.get(1, 0).unwrap(), 6.0);
        assert!(m.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_baseline_filters_direction_and_track() {
        let series = TimeSeries::new(vec![
            scene(5, OrbitDirection::Ascending, 114, vec![1.0; 4]),
            scene(6, OrbitDirection::Descending, 150, vec![100.0; 4]),
            scene(7, OrbitDirection::Ascending, 99, vec![100.0; 4]),
            scene(17, OrbitDirection::Ascending, 114, vec![3.0; 4]),
        ]);
        let composite = baseline_composite(&series, &filter(), 0.0).unwrap();

        assert_eq!(composite.summary.count, 2);
        assert_eq!(composite.summary.span(), "from 2023-07-05 to 2023-07-17");
        for &v in composite.raster.data().iter() {
            assert_relative_eq!(v, 2.0);
        }
    }

    #[test]
    fn test_single_tile_baseline_keeps_pixel_count() {
        let tile = scene(12, OrbitDirection::Ascending, 114, vec![0.5, 0.6, 0.7, 0.8]);
        let series = TimeSeries::new(vec![tile.clone()]);
        let composite = baseline_composite(&series, &filter(), 10.0).unwrap();

        assert_eq!(composite.summary.count, 1);
        assert_eq!(composite.raster.shape(), tile.image.single_band().unwrap().raster.shape());
        assert_eq!(composite.raster.valid_count(), 4);
    }

    #[test]
    fn test_baseline_no_imagery() {
        let series = TimeSeries::new(vec![scene(5, OrbitDirection::Descending, 150, vec![1.0; 4])]);
        let err = baseline_composite(&series, &filter(), 50.0).unwrap_err();
        assert!(matches!(err, Error::NoImagery { .. }));
    }
}

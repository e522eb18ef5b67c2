//! Same-day mosaics and grid resampling
//!
//! Tiles are overlaid in acquisition order; at every pixel the first tile
//! holding a valid value wins. Tiles on a different grid are sampled onto the
//! target grid by nearest cell center. Tiles must share the target's CRS;
//! auxiliary layers may also be warped from longitude/latitude or UTM.

use ndarray::Array2;
use crate::maybe_rayon::*;
use sarflood_core::crs::CoordTransform;
use sarflood_core::raster::{Raster, RasterElement};
use sarflood_core::scene::Scene;
use sarflood_core::{CRS, Error, Result};

/// Sample `src` onto the grid of `template` by nearest cell center
///
/// Target cells whose center falls outside `src` are NaN. Rasters on the same
/// grid are copied unchanged.
///
/// # Errors
/// [`Error::ShapeMismatch`] if the two rasters carry different CRSs.
pub fn resample_nearest<U: RasterElement>(src: &Raster<f64>, template: &Raster<U>) -> Result<Raster<f64>> {
    if !CRS::compatible(src.crs(), template.crs()) {
        return Err(Error::ShapeMismatch {
            layer: "tile".into(),
            reason: "CRS differs from the target grid".into(),
        });
    }
    if src.shape() == template.shape() && src.transform().same_grid(template.transform()) {
        let mut out = src.clone();
        out.set_crs(template.crs().cloned());
        return Ok(out);
    }

    sample_onto(src, template, CoordTransform::Identity)
}

/// Sample a layer in any supported CRS onto the grid of `template`
///
/// Each target cell center is moved into the CRS of `src` and takes the
/// value of the cell it falls in, so a longitude/latitude layer can feed a
/// UTM grid.
///
/// # Errors
/// [`Error::ShapeMismatch`] if no transform between the two CRSs is known.
pub fn warp_nearest<U: RasterElement>(
    src: &Raster<f64>,
    template: &Raster<U>,
    layer: &str,
) -> Result<Raster<f64>> {
    match CoordTransform::require(template.crs(), src.crs(), layer)? {
        CoordTransform::Identity => resample_nearest(src, template),
        transform => sample_onto(src, template, transform),
    }
}

fn sample_onto<U: RasterElement>(
    src: &Raster<f64>,
    template: &Raster<U>,
    transform: CoordTransform,
) -> Result<Raster<f64>> {
    let (rows, cols) = template.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let (x, y) = template.pixel_to_geo(col, row);
                    let (x, y) = transform.apply(x, y);
                    src.pixel_at(x, y)
                        .and_then(|(r, c)| src.valid_at(r, c))
                        .unwrap_or(f64::NAN)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    template.with_data(data, Some(f64::NAN))
}

/// Overlay the single band of every scene, first valid value wins
///
/// The output lies on the grid of `template` when given, otherwise on the grid
/// of the first scene.
///
/// # Errors
/// * [`Error::NoImagery`] if `scenes` is empty
/// * [`Error::InvalidInput`] if a scene has more than one band
pub fn mosaic(scenes: &[&Scene], template: Option<&Raster<f64>>) -> Result<Raster<f64>> {
    let Some(first) = scenes.first() else {
        return Err(Error::NoImagery {
            what: "mosaic of zero tiles".into(),
        });
    };
    let grid = match template {
        Some(t) => t,
        None => &first.image.single_band()?.raster,
    };

    let mut out = grid.like(f64::NAN, Some(f64::NAN));
    for scene in scenes {
        let tile = resample_nearest(&scene.image.single_band()?.raster, grid)?;
        for (dst, &v) in out.data_mut().iter_mut().zip(tile.data().iter()) {
            if dst.is_nan() && !v.is_nan() {
                *dst = v;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sarflood_core::raster::{GeoTransform, Image};
    use sarflood_core::scene::OrbitDirection;

    fn tile(values: Vec<f64>, origin_x: f64) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(GeoTransform::new(origin_x, 20.0, 10.0, -10.0));
        r
    }

    fn scene(id: &str, raster: Raster<f64>) -> Scene {
        Scene {
            id: id.into(),
            date: NaiveDate::from_ymd_opt(2024, 7, 5).unwrap(),
            direction: OrbitDirection::Ascending,
            track: 114,
            image: Image::single("VH", raster),
        }
    }

    #[test]
    fn test_first_valid_tile_wins() {
        let a = scene("a", tile(vec![1.0, f64::NAN, 3.0, f64::NAN], 0.0));
        let b = scene("b", tile(vec![9.0, 2.0, 9.0, f64::NAN], 0.0));
        let m = mosaic(&[&a, &b], None).unwrap();

        assert_eq!(m.get(0, 0).unwrap(), 1.0);
        assert_eq!(m.get(0, 1).unwrap(), 2.0);
        assert_eq!(m.get(1, 0).unwrap(), 3.0);
        assert!(m.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_mosaic_onto_template_grid() {
        // Template spans two tiles side by side
        let mut template = Raster::filled(2, 4, 0.0);
        template.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));

        let west = scene("w", tile(vec![1.0; 4], 0.0));
        let east = scene("e", tile(vec![2.0; 4], 20.0));
        let m = mosaic(&[&west, &east], Some(&template)).unwrap();

        assert_eq!(m.shape(), (2, 4));
        assert_eq!(m.get(0, 0).unwrap(), 1.0);
        assert_eq!(m.get(1, 3).unwrap(), 2.0);
    }

    #[test]
    fn test_empty_mosaic_is_no_imagery() {
        assert!(matches!(mosaic(&[], None), Err(Error::NoImagery { .. })));
    }

    #[test]
    fn test_resample_rejects_other_crs() {
        let mut src = tile(vec![1.0; 4], 0.0);
        src.set_crs(Some(CRS::from_epsg(32646)));
        let mut template = tile(vec![0.0; 4], 0.0);
        template.set_crs(Some(CRS::wgs84()));
        assert!(resample_nearest(&src, &template).is_err());
    }

    #[test]
    fn test_warp_geographic_layer_onto_utm_grid() {
        use sarflood_core::crs::wgs84_to_utm;

        // Quarter-degree cells valued by column index
        let mut src = Raster::from_vec(vec![0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0], 2, 4).unwrap();
        src.set_transform(GeoTransform::new(90.0, 24.0, 0.25, -0.25));
        src.set_crs(Some(CRS::wgs84()));

        // One 10 m UTM cell centered on 90.41 E, 23.81 N
        let (e, n) = wgs84_to_utm(90.41, 23.81, 46, true);
        let mut template: Raster<f64> = Raster::new(1, 1);
        template.set_transform(GeoTransform::new(e - 5.0, n + 5.0, 10.0, -10.0));
        template.set_crs(Some(CRS::from_epsg(32646)));

        let warped = warp_nearest(&src, &template, "elevation").unwrap();
        assert_eq!(warped.get(0, 0).unwrap(), 1.0);
        assert_eq!(warped.crs(), template.crs());

        src.set_crs(Some(CRS::from_epsg(3857)));
        assert!(matches!(
            warp_nearest(&src, &template, "elevation"),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}

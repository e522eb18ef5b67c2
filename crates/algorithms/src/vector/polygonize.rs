//! Raster to polygon conversion of binary masks
//!
//! Positive pixels are grouped into 4-connected regions and the boundary of
//! each region is traced along pixel edges. Exterior rings come out
//! counter-clockwise and holes clockwise. Each region becomes one feature with
//! a `label` of 1 and the `count` of pixels it covers at the working scale.
//!
//! The mask is first sampled at the requested scale. When the sampled grid
//! would exceed the pixel budget, best-effort mode keeps coarsening until it
//! fits and marks the result as degraded.

use std::collections::HashMap;
use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use tracing::warn;
use crate::mask::components::label_components;
use crate::maybe_rayon::*;
use sarflood_core::raster::{Connectivity, GeoTransform, Raster, MASK_NODATA};
use sarflood_core::vector::{AttributeValue, Feature, FeatureCollection, Region};
use sarflood_core::{Error, Result};

/// Parameters for polygonization
#[derive(Debug, Clone)]
pub struct PolygonizeParams {
    /// Working resolution in map units
    pub scale: f64,
    /// Largest number of working pixels
    pub max_pixels: usize,
    /// Coarsen instead of failing when `max_pixels` is exceeded
    pub best_effort: bool,
}

impl Default for PolygonizeParams {
    fn default() -> Self {
        Self {
            scale: 10.0,
            max_pixels: 100_000_000,
            best_effort: true,
        }
    }
}

/// Polygons of a mask and the scale they were traced at
#[derive(Debug, Clone)]
pub struct Polygonized {
    pub features: FeatureCollection,
    /// Input pixels per working pixel along each axis
    pub factor: usize,
    /// Working resolution in map units
    pub scale: f64,
    /// Whether the scale was coarsened to fit the pixel budget
    pub degraded: bool,
}

/// Trace the positive regions of a 0/1 mask inside `region`.
///
/// # Errors
/// * [`Error::InvalidParameter`] for a non-positive scale or zero pixel budget
/// * [`Error::TooManyPixels`] if the budget is exceeded without best effort
pub fn polygonize(mask: &Raster<u8>, region: &Region, params: &PolygonizeParams) -> Result<Polygonized> {
    if !(params.scale.is_finite() && params.scale > 0.0) {
        return Err(Error::invalid_param("vectorize_scale", params.scale, "must be positive"));
    }
    if params.max_pixels == 0 {
        return Err(Error::invalid_param("max_pixels", 0, "must be at least 1"));
    }

    let cell = mask.cell_size();
    let requested = if cell > 0.0 {
        ((params.scale / cell).round() as usize).max(1)
    } else {
        1
    };

    let mut factor = requested;
    let mut degraded = false;
    loop {
        let pixels = working_pixels(mask.shape(), factor);
        if pixels <= params.max_pixels {
            break;
        }
        if !params.best_effort {
            return Err(Error::TooManyPixels {
                pixels,
                scale: cell * factor as f64,
                limit: params.max_pixels,
            });
        }
        factor *= 2;
        degraded = true;
    }
    if degraded {
        warn!(
            requested = params.scale,
            used = cell * factor as f64,
            "pixel budget exceeded, polygonizing at a coarser scale"
        );
    }

    let working = sample_mask(mask, factor, region);
    let components = label_components(&working, Connectivity::Four);

    let mut pixels: Vec<Vec<(usize, usize)>> = vec![Vec::new(); components.len()];
    for ((row, col), &label) in components.labels.indexed_iter() {
        if label > 0 {
            pixels[label as usize - 1].push((row, col));
        }
    }

    let transform = *working.transform();
    let features: Vec<Feature> = pixels
        .into_par_iter()
        .enumerate()
        .map(|(k, cells)| {
            let label = k as u32 + 1;
            let geometry = trace_region(&components.labels, label, &cells, &transform);
            let mut feature = Feature::new(geometry);
            feature.set_property("label", AttributeValue::Int(1));
            feature.set_property("count", AttributeValue::Int(cells.len() as i64));
            feature
        })
        .collect();

    Ok(Polygonized {
        features: features.into_iter().collect(),
        factor,
        scale: cell * factor as f64,
        degraded,
    })
}

fn working_pixels((rows, cols): (usize, usize), factor: usize) -> usize {
    rows.div_ceil(factor).saturating_mul(cols.div_ceil(factor))
}

/// Sample every `factor`-th pixel center and clear cells outside the region
fn sample_mask(mask: &Raster<u8>, factor: usize, region: &Region) -> Raster<u8> {
    let (rows, cols) = mask.shape();
    let (out_rows, out_cols) = (rows.div_ceil(factor), cols.div_ceil(factor));

    let mut working: Raster<u8> = Raster::new(out_rows, out_cols);
    working.set_transform(mask.transform().coarsened(factor));
    working.set_crs(mask.crs().cloned());
    working.set_nodata(Some(MASK_NODATA));

    let inside = region.mask_for(&working);
    for ((row, col), v) in working.data_mut().indexed_iter_mut() {
        let src_row = (row * factor + factor / 2).min(rows - 1);
        let src_col = (col * factor + factor / 2).min(cols - 1);
        let positive = mask.valid_at(src_row, src_col).is_some_and(|m| m == 1);
        *v = u8::from(positive && inside[[row, col]]);
    }
    working
}

type Vertex = (i64, i64);

/// Boundary polygons of one labeled region
fn trace_region(labels: &ndarray::Array2<u32>, label: u32, cells: &[(usize, usize)], transform: &GeoTransform) -> geo::Geometry<f64> {
    let (rows, cols) = labels.dim();
    let same = |r: i64, c: i64| {
        r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols && labels[[r as usize, c as usize]] == label
    };

    // Directed pixel edges with the region on the left in map orientation
    // (vertex = (col, row) of a pixel corner, rows grow southward)
    let mut edges: Vec<(Vertex, Vertex)> = Vec::new();
    for &(row, col) in cells {
        let (r, c) = (row as i64, col as i64);
        if !same(r - 1, c) {
            edges.push(((c + 1, r), (c, r)));
        }
        if !same(r + 1, c) {
            edges.push(((c, r + 1), (c + 1, r + 1)));
        }
        if !same(r, c - 1) {
            edges.push(((c, r), (c, r + 1)));
        }
        if !same(r, c + 1) {
            edges.push(((c + 1, r + 1), (c + 1, r)));
        }
    }

    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, &(start, _)) in edges.iter().enumerate() {
        outgoing.entry(start).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings: Vec<Vec<Vertex>> = Vec::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        used[first] = true;
        let (start, mut at) = edges[first];
        let mut heading = direction(start, at);
        let mut ring = vec![start];

        while at != start {
            let Some(next) = next_edge(&outgoing, &edges, &used, at, heading) else {
                break;
            };
            used[next] = true;
            ring.push(at);
            heading = direction(edges[next].0, edges[next].1);
            at = edges[next].1;
        }
        ring.push(start);
        rings.push(drop_collinear(ring));
    }

    // Shells are counter-clockwise in map coordinates
    let flipped = transform.pixel_width * transform.pixel_height > 0.0;
    let mut shells: Vec<LineString<f64>> = Vec::new();
    let mut holes: Vec<LineString<f64>> = Vec::new();
    for ring in rings {
        let mut line: LineString<f64> = ring
            .iter()
            .map(|&(x, y)| {
                let (gx, gy) = transform.pixel_to_geo_corner(x as usize, y as usize);
                Coord { x: gx, y: gy }
            })
            .collect();
        if flipped {
            line.0.reverse();
        }
        if signed_area(&line) > 0.0 {
            shells.push(line);
        } else {
            holes.push(line);
        }
    }

    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> =
        shells.into_iter().map(|s| (s, Vec::new())).collect();
    for hole in holes {
        let target = if polygons.len() == 1 {
            0
        } else {
            let inside = interior_point(&hole);
            polygons
                .iter()
                .position(|(shell, _)| Polygon::new(shell.clone(), vec![]).contains(&inside))
                .unwrap_or(0)
        };
        if let Some((_, interiors)) = polygons.get_mut(target) {
            interiors.push(hole);
        }
    }

    let mut polygons: Vec<Polygon<f64>> = polygons
        .into_iter()
        .map(|(shell, interiors)| Polygon::new(shell, interiors))
        .collect();
    if polygons.len() == 1 {
        geo::Geometry::Polygon(polygons.remove(0))
    } else {
        geo::Geometry::MultiPolygon(MultiPolygon(polygons))
    }
}

fn direction(from: Vertex, to: Vertex) -> Vertex {
    (to.0 - from.0, to.1 - from.1)
}

/// Unused edge leaving `at`, preferring a left turn, then straight, then right.
///
/// Turning left keeps the boundary on the pixel just passed, so regions
/// touching only at a corner stay separate.
fn next_edge(
    outgoing: &HashMap<Vertex, Vec<usize>>,
    edges: &[(Vertex, Vertex)],
    used: &[bool],
    at: Vertex,
    heading: Vertex,
) -> Option<usize> {
    outgoing
        .get(&at)?
        .iter()
        .copied()
        .filter(|&i| !used[i])
        .min_by_key(|&i| {
            let d = direction(edges[i].0, edges[i].1);
            // Rows grow southward, so a left turn on the map has a negative cross product here
            let cross = heading.0 * d.1 - heading.1 * d.0;
            match cross.signum() {
                -1 => 0,
                0 => 1,
                _ => 2,
            }
        })
}

/// Remove vertices in the middle of straight runs; the ring stays closed.
fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len() - 1;
    if n < 4 {
        return ring;
    }
    let open = &ring[..n];
    let mut kept: Vec<Vertex> = (0..n)
        .filter(|&i| {
            let prev = open[(i + n - 1) % n];
            let next = open[(i + 1) % n];
            direction(prev, open[i]) != direction(open[i], next)
        })
        .map(|i| open[i])
        .collect();
    if let Some(&first) = kept.first() {
        kept.push(first);
    }
    kept
}

fn signed_area(ring: &LineString<f64>) -> f64 {
    ring.lines()
        .map(|l| l.start.x * l.end.y - l.end.x * l.start.y)
        .sum::<f64>()
        / 2.0
}

/// A point just inside a hole ring, next to its first edge
fn interior_point(hole: &LineString<f64>) -> Point<f64> {
    match hole.lines().next() {
        Some(l) => {
            let mid = Coord {
                x: (l.start.x + l.end.x) / 2.0,
                y: (l.start.y + l.end.y) / 2.0,
            };
            // Holes run clockwise, so their interior lies to the right
            let (dx, dy) = (l.end.x - l.start.x, l.end.y - l.start.y);
            let len = (dx * dx + dy * dy).sqrt().max(f64::EPSILON);
            Point::new(mid.x + dy / len * 1e-6, mid.y - dx / len * 1e-6)
        }
        None => Point::new(f64::NAN, f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use approx::assert_relative_eq;

    fn mask_from(rows: &[&str]) -> Raster<u8> {
        let cols = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|r| r.chars().map(|ch| u8::from(ch == '#')))
            .collect();
        let mut mask = Raster::from_vec(data, rows.len(), cols).unwrap();
        mask.set_transform(GeoTransform::new(0.0, rows.len() as f64 * 10.0, 10.0, -10.0));
        mask
    }

    fn region_of(r: &Raster<u8>) -> Region {
        Region::from_bounds("aoi", r.bounds())
    }

    fn areas(p: &Polygonized) -> Vec<f64> {
        p.features
            .iter()
            .map(|f| f.geometry.as_ref().unwrap().unsigned_area())
            .collect()
    }

    #[test]
    fn test_square_block() {
        let mask = mask_from(&[
            "....",
            ".##.",
            ".##.",
            "....",
        ]);
        let result = polygonize(&mask, &region_of(&mask), &PolygonizeParams::default()).unwrap();

        assert_eq!(result.features.len(), 1);
        assert!(!result.degraded);
        let feature = &result.features.features[0];
        assert_eq!(feature.get_property("count"), Some(&AttributeValue::Int(4)));
        assert_eq!(feature.get_property("label"), Some(&AttributeValue::Int(1)));
        match feature.geometry.as_ref().unwrap() {
            geo::Geometry::Polygon(p) => {
                // Four corners plus closing vertex
                assert_eq!(p.exterior().0.len(), 5);
                assert_relative_eq!(p.signed_area(), 400.0);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_diagonal_pixels_are_separate() {
        let mask = mask_from(&[
            "#.",
            ".#",
        ]);
        let result = polygonize(&mask, &region_of(&mask), &PolygonizeParams::default()).unwrap();
        assert_eq!(result.features.len(), 2);
        assert_eq!(areas(&result), vec![100.0, 100.0]);
    }

    #[test]
    fn test_ring_with_hole() {
        let mask = mask_from(&[
            "###",
            "#.#",
            "###",
        ]);
        let result = polygonize(&mask, &region_of(&mask), &PolygonizeParams::default()).unwrap();
        assert_eq!(result.features.len(), 1);
        match result.features.features[0].geometry.as_ref().unwrap() {
            geo::Geometry::Polygon(p) => {
                assert_eq!(p.interiors().len(), 1);
                assert_relative_eq!(p.unsigned_area(), 800.0);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_corner_touching_pocket() {
        // The background pocket reaches the outside through a corner only
        let mask = mask_from(&[
            "###.",
            "#.#.",
            "##..",
        ]);
        let result = polygonize(&mask, &region_of(&mask), &PolygonizeParams::default()).unwrap();
        assert_eq!(result.features.len(), 1);
        assert_relative_eq!(areas(&result)[0], 700.0);
    }

    #[test]
    fn test_coarse_scale_samples_centers() {
        let mut rows = vec![String::from("........"); 8];
        for row in rows.iter_mut().take(4) {
            row.replace_range(0..4, "####");
        }
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let mask = mask_from(&refs);

        let params = PolygonizeParams {
            scale: 20.0,
            ..Default::default()
        };
        let result = polygonize(&mask, &region_of(&mask), &params).unwrap();
        assert_eq!(result.factor, 2);
        assert_eq!(result.features.features[0].get_property("count"), Some(&AttributeValue::Int(4)));
        assert_relative_eq!(areas(&result)[0], 1600.0);
    }

    #[test]
    fn test_pixel_budget() {
        let mask = mask_from(&["####", "####", "####", "####"]);
        let strict = PolygonizeParams {
            scale: 10.0,
            max_pixels: 4,
            best_effort: false,
        };
        assert!(matches!(
            polygonize(&mask, &region_of(&mask), &strict),
            Err(Error::TooManyPixels { .. })
        ));

        let lenient = PolygonizeParams {
            best_effort: true,
            ..strict
        };
        let result = polygonize(&mask, &region_of(&mask), &lenient).unwrap();
        assert!(result.degraded);
        assert_eq!(result.factor, 2);
        assert_relative_eq!(areas(&result)[0], 1600.0);
    }

    #[test]
    fn test_region_clips_features() {
        let mask = mask_from(&["####", "####"]);
        let west = Region::from_bounds("west", (0.0, 0.0, 20.0, 20.0));
        let result = polygonize(&mask, &west, &PolygonizeParams::default()).unwrap();
        assert_eq!(areas(&result), vec![400.0]);
    }
}

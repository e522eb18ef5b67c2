//! Point buffers
//!
//! Circles around points are approximated as polygons. The zonal sampler
//! reduces over the bounding box of the buffer rather than the circle itself.

use geo::{BoundingRect, LineString, Point, Polygon};
use std::f64::consts::PI;

/// Parameters for buffer operations
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer radius in map units
    pub distance: f64,
    /// Number of segments to approximate the circle (default: 16)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 15.0,
            segments: 16,
        }
    }
}

/// Create a circular buffer around a point.
///
/// Generates a polygon approximating a circle with the given number
/// of segments.
///
/// # Arguments
/// * `point` - Center point
/// * `params` - Buffer parameters (distance, segments)
///
/// # Returns
/// A polygon approximating a circle
pub fn buffer_points(point: &Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance.abs();
    let cx = point.x();
    let cy = point.y();

    let mut coords = Vec::with_capacity(n + 1);
    for i in 0..n {
        let angle = 2.0 * PI * i as f64 / n as f64;
        coords.push((cx + r * angle.cos(), cy + r * angle.sin()));
    }
    // Close the ring
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}

/// Minimum bounding box of a point buffer as (min_x, min_y, max_x, max_y)
///
/// With a segment count divisible by 4 this is the square of side `2 * distance`
/// centered on the point.
pub fn buffer_bounds(point: &Point<f64>, params: &BufferParams) -> (f64, f64, f64, f64) {
    match buffer_points(point, params).bounding_rect() {
        Some(rect) => (rect.min().x, rect.min().y, rect.max().x, rect.max().y),
        None => (point.x(), point.y(), point.x(), point.y()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::Area;

    #[test]
    fn test_buffer_point_circle() {
        let point = Point::new(0.0, 0.0);
        let params = BufferParams {
            distance: 10.0,
            segments: 64,
        };

        let polygon = buffer_points(&point, &params);

        // Area should approximate π * r²
        let expected_area = PI * 100.0;
        let actual_area = polygon.unsigned_area();

        let error = (actual_area - expected_area).abs() / expected_area;
        assert!(
            error < 0.01,
            "Circle area error {:.2}% (expected {:.1}, got {:.1})",
            error * 100.0,
            expected_area,
            actual_area
        );
    }

    #[test]
    fn test_buffer_bounds_square() {
        let point = Point::new(500.0, 2000.0);
        let (min_x, min_y, max_x, max_y) = buffer_bounds(&point, &BufferParams::default());

        assert_relative_eq!(min_x, 485.0, epsilon = 1e-9);
        assert_relative_eq!(max_x, 515.0, epsilon = 1e-9);
        assert_relative_eq!(min_y, 1985.0, epsilon = 1e-9);
        assert_relative_eq!(max_y, 2015.0, epsilon = 1e-9);
    }

    #[test]
    fn test_buffer_zero_distance() {
        let point = Point::new(3.0, 4.0);
        let bounds = buffer_bounds(&point, &BufferParams { distance: 0.0, segments: 16 });
        assert_eq!(bounds, (3.0, 4.0, 3.0, 4.0));
    }
}

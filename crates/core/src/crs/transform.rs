//! WGS84 geodesy and WGS84 <-> UTM conversion (Snyder 1987, USGS formulas)
//!
//! Regions and ground-truth points usually come as longitude/latitude while
//! radar scenes are gridded in UTM. [`CoordTransform`] moves coordinates
//! between those two frames; any other pair of reference systems is
//! reported as unsupported.

use super::CRS;
use crate::error::{Error, Result};

/// WGS84 semi-major axis (m)
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

const E2: f64 = 2.0 * WGS84_F - WGS84_F * WGS84_F;
const E_PRIME2: f64 = E2 / (1.0 - E2);
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Ground size in meters of a geographic grid cell at `latitude_deg`
///
/// Returns `(dx, dy)`: east-west and north-south extent of a cell spanning
/// `d_lon` by `d_lat` degrees.
pub fn cell_dimensions(latitude_deg: f64, d_lon: f64, d_lat: f64) -> (f64, f64) {
    let lat = latitude_deg.to_radians();
    let sin2 = lat.sin() * lat.sin();

    // Prime vertical and meridional radii of curvature
    let n = WGS84_A / (1.0 - E2 * sin2).sqrt();
    let m = WGS84_A * (1.0 - E2) / (1.0 - E2 * sin2).powf(1.5);

    let dx = n * lat.cos() * d_lon.to_radians();
    let dy = m * d_lat.to_radians();
    (dx.abs(), dy.abs())
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx: zone xx, northern hemisphere
/// - EPSG 327xx: zone xx, southern hemisphere
pub fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Meridional arc from the equator to `lat` (radians), Snyder eq. 3-21
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    WGS84_A
        * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
            - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

/// WGS84 (longitude, latitude) in degrees to UTM (easting, northing) in meters
pub fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    let (sin_lat, cos_lat, tan_lat) = (lat.sin(), lat.cos(), lat.tan());
    let n = WGS84_A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - central_meridian(zone));
    let m = meridional_arc(lat);

    let a2 = a * a;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9 and 8-10
    let easting = K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
        + FALSE_EASTING;
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    (easting, if north { northing } else { northing + FALSE_NORTHING_SOUTH })
}

/// UTM (easting, northing) in meters to WGS84 (longitude, latitude) in degrees
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north { northing } else { northing - FALSE_NORTHING_SOUTH };

    // Footpoint latitude, Snyder eq. 7-19 and 3-26
    let m = y / K0;
    let e4 = E2 * E2;
    let mu = m / (WGS84_A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e4 * E2 / 256.0));
    let e1 = (1.0 - (1.0 - E2).sqrt()) / (1.0 + (1.0 - E2).sqrt());
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1, tan1) = (phi1.sin(), phi1.cos(), phi1.tan());
    let c1 = E_PRIME2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let n1 = WGS84_A / (1.0 - E2 * sin1 * sin1).sqrt();
    let r1 = WGS84_A * (1.0 - E2) / (1.0 - E2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * K0);

    // Snyder eq. 8-17 and 8-18
    let lat = phi1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1) * d.powi(5)
                / 120.0)
            / cos1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Point transform between two reference systems
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordTransform {
    /// Same frame, or a frame left unspecified on one side
    Identity,
    /// Longitude/latitude to UTM
    ToUtm { zone: u32, north: bool },
    /// UTM to longitude/latitude
    FromUtm { zone: u32, north: bool },
}

impl CoordTransform {
    /// Transform from `from` to `to`, `None` if the pair is not supported.
    ///
    /// A missing CRS on either side is taken to be the other one.
    pub fn between(from: Option<&CRS>, to: Option<&CRS>) -> Option<Self> {
        let (from, to) = match (from, to) {
            (Some(a), Some(b)) => (a, b),
            _ => return Some(Self::Identity),
        };
        if from.is_equivalent(to) {
            return Some(Self::Identity);
        }
        if from.is_geographic() {
            let (zone, north) = to.epsg().and_then(parse_utm_epsg)?;
            return Some(Self::ToUtm { zone, north });
        }
        if to.is_geographic() {
            let (zone, north) = from.epsg().and_then(parse_utm_epsg)?;
            return Some(Self::FromUtm { zone, north });
        }
        None
    }

    /// Like [`between`](Self::between), with an unsupported pair reported as
    /// an [`Error::ShapeMismatch`] for `layer`
    pub fn require(from: Option<&CRS>, to: Option<&CRS>, layer: &str) -> Result<Self> {
        Self::between(from, to).ok_or_else(|| Error::ShapeMismatch {
            layer: layer.to_string(),
            reason: format!("no transform from {} to {}", describe(from), describe(to)),
        })
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Self::Identity => (x, y),
            Self::ToUtm { zone, north } => wgs84_to_utm(x, y, zone, north),
            Self::FromUtm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }
}

fn describe(crs: Option<&CRS>) -> String {
    crs.map_or_else(|| "unknown CRS".to_string(), CRS::identifier)
}

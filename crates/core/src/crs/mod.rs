//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

mod transform;

pub use transform::{
    cell_dimensions, parse_utm_epsg, utm_to_wgs84, wgs84_to_utm, CoordTransform, WGS84_A, WGS84_F,
};

/// Geographic (longitude/latitude) EPSG codes: WGS84, NAD83, ETRS89, GDA94
const GEOGRAPHIC_EPSG: &[u32] = &[4326, 4269, 4258, 4283];

/// Coordinate reference system of a raster, region or point set.
///
/// Rasters are compared by identity and never warped between projections;
/// vector inputs are moved onto the raster frame with [`CoordTransform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// WKT representation
    wkt: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// Parse an `EPSG:<code>` identifier, falling back to WKT.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .and_then(|code| code.parse().ok())
        {
            Some(code) => Self::from_epsg(code),
            None => Self::from_wkt(trimmed),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        match (self.epsg, &self.wkt) {
            (Some(code), _) => GEOGRAPHIC_EPSG.contains(&code),
            (None, Some(wkt)) => {
                let head = wkt.trim_start().to_ascii_uppercase();
                head.starts_with("GEOGCS") || head.starts_with("GEOGCRS")
            }
            (None, None) => false,
        }
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        false
    }

    /// Whether two optional CRS can be treated as the same grid frame.
    ///
    /// A missing CRS on either side is accepted; rasters built in memory
    /// usually carry none.
    pub fn compatible(a: Option<&CRS>, b: Option<&CRS>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.is_equivalent(b),
            _ => true,
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_parse() {
        assert_eq!(CRS::parse("EPSG:32646").epsg(), Some(32646));
        assert_eq!(CRS::parse("epsg:4326"), CRS::wgs84());
        assert!(CRS::parse("LOCAL_CS[\"grid\"]").wkt().is_some());
    }

    #[test]
    fn test_crs_compatibility() {
        let utm = CRS::from_epsg(32646);
        assert!(CRS::compatible(Some(&utm), None));
        assert!(CRS::compatible(Some(&utm), Some(&CRS::from_epsg(32646))));
        assert!(!CRS::compatible(Some(&utm), Some(&CRS::wgs84())));
    }

    #[test]
    fn test_geographic_detection() {
        assert!(CRS::wgs84().is_geographic());
        assert!(CRS::parse("GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\"]]").is_geographic());
        assert!(!CRS::from_epsg(32646).is_geographic());
        assert!(!CRS::parse("PROJCS[\"UTM 46N\"]").is_geographic());
    }
}

//! Vector data structures: features, regions of interest and point sets

use crate::crs::{CoordTransform, CRS};
use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};
use geo::{BoundingRect, Contains, MapCoords, Rect};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes, in stable key order
    pub properties: BTreeMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

/// Area of interest shared by every stage of a run
///
/// Coordinates are in `crs`; a region without a CRS is taken to be in the
/// frame of whatever raster it is applied to.
#[derive(Debug, Clone)]
pub struct Region {
    /// Identifier used in export names
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    envelope: Option<Rect<f64>>,
    crs: Option<CRS>,
}

impl Region {
    pub fn new(name: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        let envelope = geometry.bounding_rect();
        Self {
            name: name.into(),
            geometry,
            envelope,
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.crs = crs;
        self
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// The same region with its vertices moved into `target`
    ///
    /// Returns a clone when no conversion is needed. Only vertices are
    /// converted; edges stay straight in the target frame.
    ///
    /// # Errors
    /// [`Error::ShapeMismatch`] if no transform to `target` is known.
    pub fn to_crs(&self, target: Option<&CRS>) -> Result<Region> {
        let layer = format!("region '{}'", self.name);
        let transform = CoordTransform::require(self.crs(), target, &layer)?;
        if transform.is_identity() {
            return Ok(self.clone());
        }
        let geometry = self.geometry.map_coords(|c| {
            let (x, y) = transform.apply(c.x, c.y);
            Coord { x, y }
        });
        Ok(Region::new(self.name.clone(), geometry).with_crs(target.cloned()))
    }

    /// Build a region from exterior rings given as `(x, y)` vertex lists.
    pub fn from_rings(name: impl Into<String>, rings: &[Vec<(f64, f64)>]) -> Result<Self> {
        let name = name.into();
        let mut polygons = Vec::with_capacity(rings.len());
        for ring in rings {
            if ring.len() < 3 {
                return Err(Error::invalid_param(
                    "region",
                    &name,
                    format!("ring has {} vertices, need at least 3", ring.len()),
                ));
            }
            polygons.push(Polygon::new(LineString::from(ring.clone()), vec![]));
        }
        if polygons.is_empty() {
            return Err(Error::invalid_param("region", &name, "no polygons"));
        }
        Ok(Self::new(name, MultiPolygon(polygons)))
    }

    /// Axis-aligned rectangular region
    pub fn from_bounds(name: impl Into<String>, (min_x, min_y, max_x, max_y): (f64, f64, f64, f64)) -> Self {
        let rect = Rect::new((min_x, min_y), (max_x, max_y));
        Self::new(name, MultiPolygon(vec![rect.to_polygon()]))
    }

    /// Region envelope as (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.envelope
            .map(|r| (r.min().x, r.min().y, r.max().x, r.max().y))
    }

    /// Whether a location lies strictly inside the region
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        match self.envelope {
            Some(env) if x >= env.min().x && x <= env.max().x && y >= env.min().y && y <= env.max().y => {
                self.geometry.contains(&Point::new(x, y))
            }
            _ => false,
        }
    }

    /// Per-pixel membership of a raster's cell centers in this region
    pub fn mask_for<T: RasterElement>(&self, raster: &Raster<T>) -> Array2<bool> {
        let (rows, cols) = raster.shape();
        Array2::from_shape_fn((rows, cols), |(row, col)| {
            let (x, y) = raster.pixel_to_geo(col, row);
            self.contains_xy(x, y)
        })
    }

    /// Whether the region envelope overlaps a bounding box
    pub fn intersects_bounds(&self, (min_x, min_y, max_x, max_y): (f64, f64, f64, f64)) -> bool {
        self.envelope.is_some_and(|env| {
            env.min().x <= max_x && env.max().x >= min_x && env.min().y <= max_y && env.max().y >= min_y
        })
    }
}

/// A ground-truth location
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub id: String,
    pub location: Point<f64>,
}

impl PointFeature {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            location: Point::new(x, y),
        }
    }
}

/// Ordered, indexable set of ground-truth points
#[derive(Debug, Clone, Default)]
pub struct PointFeatureSet {
    points: Vec<PointFeature>,
    crs: Option<CRS>,
}

impl PointFeatureSet {
    pub fn new(points: Vec<PointFeature>) -> Self {
        Self { points, crs: None }
    }

    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.crs = crs;
        self
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// The same points, in the same order, moved into `target`
    ///
    /// # Errors
    /// [`Error::ShapeMismatch`] if no transform to `target` is known.
    pub fn to_crs(&self, target: Option<&CRS>) -> Result<PointFeatureSet> {
        let transform = CoordTransform::require(self.crs(), target, "points")?;
        if transform.is_identity() {
            return Ok(self.clone());
        }
        let points = self
            .points
            .iter()
            .map(|p| {
                let (x, y) = transform.apply(p.location.x(), p.location.y());
                PointFeature::new(p.id.clone(), x, y)
            })
            .collect();
        Ok(PointFeatureSet::new(points).with_crs(target.cloned()))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PointFeature] {
        &self.points
    }

    /// Points in `range`, clipped to the end of the set
    pub fn slice(&self, range: Range<usize>) -> &[PointFeature] {
        let end = range.end.min(self.points.len());
        let start = range.start.min(end);
        &self.points[start..end]
    }
}

impl FromIterator<PointFeature> for PointFeatureSet {
    fn from_iter<I: IntoIterator<Item = PointFeature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

//! GeoJSON encoding of feature collections

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::{Coord, Geometry, LineString, Polygon};
use serde_json::{Map, Value, json};
use std::io::Write;

fn position(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn ring(ls: &LineString<f64>) -> Value {
    Value::Array(ls.coords().map(position).collect())
}

fn polygon_rings(p: &Polygon<f64>) -> Value {
    let mut rings = vec![ring(p.exterior())];
    rings.extend(p.interiors().iter().map(ring));
    Value::Array(rings)
}

/// GeoJSON geometry object for the geometry kinds this crate produces
pub fn geometry_to_json(geometry: &Geometry<f64>) -> Result<Value> {
    let value = match geometry {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": position(&p.0) }),
        Geometry::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_rings(p) }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_rings).collect::<Vec<_>>(),
        }),
        Geometry::Rect(r) => {
            let p = r.to_polygon();
            json!({ "type": "Polygon", "coordinates": polygon_rings(&p) })
        }
        _ => {
            return Err(Error::UnsupportedDataType(
                "only point and polygon geometries can be exported".into(),
            ));
        }
    };
    Ok(value)
}

fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(i) => json!(i),
        AttributeValue::Float(f) if f.is_finite() => json!(f),
        AttributeValue::Float(_) => Value::Null,
        AttributeValue::String(s) => Value::String(s.clone()),
    }
}

fn feature_to_json(feature: &Feature) -> Result<Value> {
    let geometry = match &feature.geometry {
        Some(g) => geometry_to_json(g)?,
        None => Value::Null,
    };
    let properties: Map<String, Value> = feature
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), attribute_to_json(v)))
        .collect();

    let mut object = Map::new();
    object.insert("type".into(), json!("Feature"));
    if let Some(id) = &feature.id {
        object.insert("id".into(), json!(id));
    }
    object.insert("geometry".into(), geometry);
    object.insert("properties".into(), Value::Object(properties));
    Ok(Value::Object(object))
}

/// Encode a feature collection as a GeoJSON document
pub fn to_geojson(collection: &FeatureCollection, crs: Option<&CRS>) -> Result<Value> {
    let features = collection
        .iter()
        .map(feature_to_json)
        .collect::<Result<Vec<_>>>()?;

    let mut doc = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if let Some(code) = crs.and_then(|c| c.epsg()) {
        doc["crs"] = json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", code) },
        });
    }
    Ok(doc)
}

/// Write a feature collection as GeoJSON
pub fn write_geojson<W: Write>(mut writer: W, collection: &FeatureCollection, crs: Option<&CRS>) -> Result<()> {
    let doc = to_geojson(collection, crs)?;
    serde_json::to_writer(&mut writer, &doc)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{LineString, Polygon};

    #[test]
    fn test_polygon_feature_with_hole() {
        let shell = LineString::from(vec![(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(1.0, 1.0), (1.0, 2.0), (2.0, 2.0), (2.0, 1.0), (1.0, 1.0)]);
        let mut feature = Feature::new(Geometry::Polygon(Polygon::new(shell, vec![hole])));
        feature.set_property("label", AttributeValue::Int(1));
        feature.set_property("ratio", AttributeValue::Float(f64::NAN));

        let collection: FeatureCollection = std::iter::once(feature).collect();
        let doc = to_geojson(&collection, Some(&CRS::from_epsg(32646))).unwrap();

        assert_eq!(doc["type"], "FeatureCollection");
        let f = &doc["features"][0];
        assert_eq!(f["geometry"]["type"], "Polygon");
        assert_eq!(f["geometry"]["coordinates"].as_array().unwrap().len(), 2);
        assert_eq!(f["properties"]["label"], 1);
        assert!(f["properties"]["ratio"].is_null());
        assert_eq!(doc["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::32646");
    }
}

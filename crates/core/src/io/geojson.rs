//! GeoJSON FeatureCollection reader for vector layers
//!
//! Map-feature extracts (coastline, roads, buildings, tourism points) are
//! exchanged as GeoJSON. Only the geometry and flat scalar properties are
//! kept; nested property objects are dropped.

use geo_types::Geometry;
use geojson::{GeoJson, JsonObject};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::crs::CRS;
use crate::error::Result;
use crate::vector::{AttributeValue, Feature, VectorLayer};

/// Read a GeoJSON file into a tagged vector layer.
///
/// The layer CRS comes from the legacy `crs` member when present, otherwise
/// `default_crs` is used (RFC 7946 files are WGS84 unless stated otherwise,
/// but extracts are often pre-projected to the scene CRS).
pub fn read_geojson<P: AsRef<Path>>(
    path: P,
    tag: &str,
    default_crs: Option<CRS>,
) -> Result<VectorLayer> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let layer = parse_geojson(&text, tag, default_crs)?;
    debug!(
        "read {} features for '{}' from {}",
        layer.len(),
        tag,
        path.as_ref().display()
    );
    Ok(layer)
}

/// Parse GeoJSON text (FeatureCollection, Feature or bare geometry)
pub fn parse_geojson(text: &str, tag: &str, default_crs: Option<CRS>) -> Result<VectorLayer> {
    let root: GeoJson = text.parse()?;

    let (crs, features) = match root {
        GeoJson::FeatureCollection(fc) => {
            let crs = crs_member(fc.foreign_members.as_ref());
            let features = fc
                .features
                .into_iter()
                .filter_map(|f| convert_feature(f).transpose())
                .collect::<Result<Vec<_>>>()?;
            (crs, features)
        }
        GeoJson::Feature(f) => {
            let crs = crs_member(f.foreign_members.as_ref());
            (crs, convert_feature(f)?.into_iter().collect())
        }
        GeoJson::Geometry(g) => {
            let crs = crs_member(g.foreign_members.as_ref());
            (crs, vec![Feature::new(convert_geometry(g)?)])
        }
    };

    Ok(VectorLayer::new(tag, crs.or(default_crs), features))
}

/// `{"crs": {"properties": {"name": "urn:ogc:def:crs:EPSG::32628"}}}`
fn crs_member(members: Option<&JsonObject>) -> Option<CRS> {
    let name = members?.get("crs")?.get("properties")?.get("name")?.as_str()?;
    // CRS84 is lon/lat WGS84
    if name.ends_with("CRS84") {
        return Some(CRS::wgs84());
    }
    let code = name.rsplit(':').next()?.parse::<u32>().ok()?;
    Some(CRS::from_epsg(code))
}

fn convert_geometry(geometry: geojson::Geometry) -> Result<Geometry<f64>> {
    Ok(Geometry::<f64>::try_from(geometry)?)
}

/// A feature with a null geometry is skipped (`Ok(None)`)
fn convert_feature(feature: geojson::Feature) -> Result<Option<Feature>> {
    let Some(geometry) = feature.geometry else {
        return Ok(None);
    };

    let mut out = Feature::new(convert_geometry(geometry)?);
    for (key, value) in feature.properties.into_iter().flatten() {
        if let Some(attr) = attribute(value) {
            out.set_property(key, attr);
        }
    }
    Ok(Some(out))
}

/// Flat scalar properties only; arrays and objects are dropped
fn attribute(value: Value) -> Option<AttributeValue> {
    Some(match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => AttributeValue::String(s),
        Value::Array(_) | Value::Object(_) => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const ISLAND: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32628"}},
        "features": [
            {"type": "Feature", "properties": {"name": "island", "area_km2": 12.5},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}},
            {"type": "Feature", "properties": {}, "geometry": null},
            {"type": "Feature", "properties": {"id": 7},
             "geometry": {"type": "MultiLineString", "coordinates": [[[0,0],[1,1]], [[2,2],[3,3]]]}}
        ]
    }"#;

    #[test]
    fn test_feature_collection() {
        let layer = parse_geojson(ISLAND, "land", None).unwrap();
        assert_eq!(layer.tag(), "land");
        assert_eq!(layer.len(), 2, "null geometry is skipped");
        assert_eq!(layer.crs().map(|c| c.epsg()), Some(32628));

        let first = &layer.features()[0];
        assert!(matches!(first.geometry, Geometry::Polygon(_)));
        assert_eq!(
            first.get_property("name"),
            Some(&AttributeValue::String("island".into()))
        );
        assert_eq!(layer.features()[1].get_property("id"), Some(&AttributeValue::Int(7)));
    }

    #[test]
    fn test_default_crs_and_bare_geometry() {
        let layer = parse_geojson(
            r#"{"type": "Point", "coordinates": [1.5, 2.5]}"#,
            "poi",
            Some(CRS::from_epsg(32628)),
        )
        .unwrap();
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.crs().map(|c| c.epsg()), Some(32628));
    }

    #[test]
    fn test_nested_properties_dropped() {
        let layer = parse_geojson(
            r#"{"type": "Feature",
                "properties": {"highway": "primary", "lanes": 2, "tags": {"ref": "GC-1"}, "oneway": true},
                "geometry": {"type": "LineString", "coordinates": [[0, 0], [5, 5]]}}"#,
            "roads",
            None,
        )
        .unwrap();
        let road = &layer.features()[0];
        assert!(matches!(road.geometry, Geometry::LineString(_)));
        assert_eq!(road.get_property("lanes"), Some(&AttributeValue::Int(2)));
        assert_eq!(road.get_property("oneway"), Some(&AttributeValue::Bool(true)));
        assert_eq!(road.get_property("tags"), None);
    }

    #[test]
    fn test_rejects_unknown_type() {
        let err = parse_geojson(r#"{"type": "Circle", "coordinates": [0, 0]}"#, "x", None);
        assert!(matches!(err, Err(Error::GeoJson(_))));
    }
}

//! Vector layers: tagged collections of features sharing one CRS

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::crs::CRS;
use crate::error::{Error, Result};

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Geometry<f64>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a new feature with geometry and no attributes
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            properties: HashMap::new(),
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

/// A set of features fetched for one map tag (coastline, roads, buildings, ...).
///
/// Layers are immutable once built; the CRS is the one the geometries are
/// expressed in and must match the raster they are burned onto.
#[derive(Debug, Clone)]
pub struct VectorLayer {
    tag: String,
    crs: Option<CRS>,
    features: Vec<Feature>,
}

impl VectorLayer {
    pub fn new(tag: impl Into<String>, crs: Option<CRS>, features: Vec<Feature>) -> Self {
        Self {
            tag: tag.into(),
            crs,
            features,
        }
    }

    /// Build a layer from bare geometries
    pub fn from_geometries<G>(tag: impl Into<String>, crs: Option<CRS>, geometries: Vec<G>) -> Self
    where
        G: Into<Geometry<f64>>,
    {
        let features = geometries.into_iter().map(Feature::new).collect();
        Self::new(tag, crs, features)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn geometries(&self) -> impl Iterator<Item = &Geometry<f64>> {
        self.features.iter().map(|f| &f.geometry)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Fail with [`Error::EmptyVectorLayer`] when the query returned nothing
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyVectorLayer {
                tag: self.tag.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Point;

    #[test]
    fn test_layer_basics() {
        let layer = VectorLayer::from_geometries(
            "tourism",
            Some(CRS::from_epsg(32628)),
            vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)],
        );
        assert_eq!(layer.tag(), "tourism");
        assert_eq!(layer.len(), 2);
        assert!(layer.ensure_non_empty().is_ok());
    }

    #[test]
    fn test_empty_layer_reports_tag() {
        let layer = VectorLayer::new("roads", None, Vec::new());
        match layer.ensure_non_empty() {
            Err(Error::EmptyVectorLayer { tag }) => assert_eq!(tag, "roads"),
            other => panic!("expected EmptyVectorLayer, got {:?}", other),
        }
    }
}

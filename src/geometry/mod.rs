//! In-memory geometry collections and the collaborators that produce them.
//!
//! A [`FeatureTable`] is an ordered list of attributed records, each carrying
//! at most one geometry. Parsing ([`GeometryParser`]) and simplification
//! ([`Simplifier`]) are delegated to the `geojson` and `geo` crates.

mod parser;
mod simplify;

pub use parser::{GeoJsonParser, GeometryParser};
pub use simplify::{Simplification, Simplifier, Tolerance, TopologyPreservingSimplifier};

use geo::{CoordsIter, Geometry};
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attributed feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  /// Feature id as found in the source (string or number)
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<Value>,
  /// Attribute fields
  #[serde(default)]
  pub properties: JsonObject,
  /// Geometry, absent when the source feature has a null geometry
  pub geometry: Option<Geometry<f64>>,
}

impl Record {
  /// Number of coordinates in this record's geometry.
  pub fn vertex_count(&self) -> usize {
    self.geometry.as_ref().map_or(0, |g| g.coords_count())
  }

  fn into_feature(self) -> Feature {
    let id = match self.id {
      Some(Value::String(s)) => Some(Id::String(s)),
      Some(Value::Number(n)) => Some(Id::Number(n)),
      _ => None,
    };

    Feature {
      bbox: None,
      geometry: self
        .geometry
        .as_ref()
        .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
      id,
      properties: Some(self.properties),
      foreign_members: None,
    }
  }
}

/// Ordered collection of records, in the parser's native order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
  pub records: Vec<Record>,
}

impl FeatureTable {
  pub fn new(records: Vec<Record>) -> Self {
    Self { records }
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Record> {
    self.records.iter()
  }

  /// Total coordinate count across all geometries.
  pub fn vertex_count(&self) -> usize {
    self.records.iter().map(Record::vertex_count).sum()
  }

  /// Convert back into a GeoJSON feature collection.
  pub fn into_feature_collection(self) -> FeatureCollection {
    FeatureCollection {
      bbox: None,
      features: self.records.into_iter().map(Record::into_feature).collect(),
      foreign_members: None,
    }
  }
}

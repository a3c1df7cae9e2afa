//! Geometry file parsing.

use std::path::Path;

use geo::Geometry;
use geojson::feature::Id;
use geojson::{Feature, GeoJson};
use serde_json::Value;

use super::{FeatureTable, Record};
use crate::error::{Error, Result};

/// Geometry file parsing collaborator.
pub trait GeometryParser: Send + Sync {
  /// Parse the file at `path` into a table, in the file's record order.
  fn parse(&self, path: &Path) -> Result<FeatureTable>;
}

/// Parser for GeoJSON content.
///
/// Accepts a FeatureCollection, a single Feature or a bare Geometry. The file
/// extension is not inspected.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonParser;

impl GeometryParser for GeoJsonParser {
  fn parse(&self, path: &Path) -> Result<FeatureTable> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::SourceAccess {
      path: path.to_path_buf(),
      source: e,
    })?;

    let geojson: GeoJson = content.parse().map_err(|e| Error::SourceParse {
      path: path.to_path_buf(),
      reason: format!("{}", e),
    })?;

    let features = match geojson {
      GeoJson::FeatureCollection(fc) => fc.features,
      GeoJson::Feature(f) => vec![f],
      GeoJson::Geometry(g) => vec![Feature {
        bbox: None,
        geometry: Some(g),
        id: None,
        properties: None,
        foreign_members: None,
      }],
    };

    let records = features
      .into_iter()
      .enumerate()
      .map(|(index, feature)| to_record(feature).map_err(|reason| Error::SourceParse {
        path: path.to_path_buf(),
        reason: format!("feature {}: {}", index, reason),
      }))
      .collect::<Result<Vec<_>>>()?;

    tracing::debug!("Parsed {} features from {}", records.len(), path.display());

    Ok(FeatureTable::new(records))
  }
}

fn to_record(feature: Feature) -> std::result::Result<Record, geojson::Error> {
  let geometry = feature
    .geometry
    .map(Geometry::<f64>::try_from)
    .transpose()?;

  let id = feature.id.map(|id| match id {
    Id::String(s) => Value::String(s),
    Id::Number(n) => Value::Number(n),
  });

  Ok(Record {
    id,
    properties: feature.properties.unwrap_or_default(),
    geometry,
  })
}

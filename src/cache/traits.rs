//! Core types for the caching system.

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::error::{Error, Result};
use crate::geometry::Simplification;

/// Key identifying one cache entry: source stem plus simplification choice.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
  stem: String,
  simplification: Simplification,
}

impl CacheKey {
  /// Derive the key for a source file and simplification choice.
  pub fn derive(source: &Path, simplification: Simplification) -> Result<Self> {
    let stem = source
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .filter(|s| !s.is_empty())
      .ok_or_else(|| Error::InvalidSource {
        path: source.to_path_buf(),
        reason: "path has no file stem".to_string(),
      })?;

    Ok(Self {
      stem,
      simplification,
    })
  }

  pub fn simplification(&self) -> Simplification {
    self.simplification
  }

  /// Entry name without extension, e.g. `regions` or `regions_simple_0.05`.
  pub fn name(&self) -> String {
    match self.simplification {
      Simplification::None => self.stem.clone(),
      Simplification::Tolerance(t) => format!("{}_simple_{}", self.stem, t),
    }
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a result from a fresh cache entry.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Create a result produced from the source file after a miss.
  pub fn from_source(data: T, source: CacheSource) -> Self {
    Self {
      data,
      source,
      cached_at: None,
    }
  }
}

/// Indicates where loaded data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh cache entry, no parsing done
  Cache,
  /// No entry existed for the key
  Missing,
  /// Entry was not newer than the source file
  Stale,
  /// Entry was written by another cache format version
  Incompatible,
  /// Entry could not be decoded and was regenerated
  Corrupt,
}

impl CacheSource {
  pub fn describe(self) -> &'static str {
    match self {
      CacheSource::Cache => "cache",
      CacheSource::Missing => "source (no cache entry)",
      CacheSource::Stale => "source (stale cache entry)",
      CacheSource::Incompatible => "source (incompatible cache entry)",
      CacheSource::Corrupt => "source (corrupt cache entry)",
    }
  }
}

//! Cache-aware loading of geometry files.

use std::path::Path;

use crate::cache::{
  CacheKey, CacheLayer, CacheResult, CacheStorage, CorruptEntryPolicy, FileStorage,
};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::geometry::{
  FeatureTable, GeoJsonParser, GeometryParser, Simplification, Simplifier, Tolerance,
  TopologyPreservingSimplifier,
};

/// Loads geometry files through a cache, optionally simplifying them.
///
/// Parsing and simplification are delegated to the configured collaborators
/// ([`GeoJsonParser`] and [`TopologyPreservingSimplifier`] by default).
pub struct GeoLoader<S: CacheStorage = FileStorage> {
  cache: CacheLayer<S>,
  parser: Box<dyn GeometryParser>,
  simplifier: Box<dyn Simplifier>,
  default_tolerance: Tolerance,
}

impl GeoLoader<FileStorage> {
  /// Create a loader backed by the cache directory in `config`.
  pub fn open(config: &CacheConfig) -> Result<Self> {
    let storage = FileStorage::open(&config.dir)?;
    Ok(
      Self::with_storage(storage)
        .with_default_tolerance(config.default_tolerance)
        .with_corrupt_policy(config.on_corrupt),
    )
  }
}

impl<S: CacheStorage> GeoLoader<S> {
  /// Create a loader over any storage backend with default collaborators.
  pub fn with_storage(storage: S) -> Self {
    Self {
      cache: CacheLayer::new(storage),
      parser: Box::new(GeoJsonParser),
      simplifier: Box::new(TopologyPreservingSimplifier),
      default_tolerance: Tolerance::default(),
    }
  }

  pub fn with_parser(mut self, parser: impl GeometryParser + 'static) -> Self {
    self.parser = Box::new(parser);
    self
  }

  pub fn with_simplifier(mut self, simplifier: impl Simplifier + 'static) -> Self {
    self.simplifier = Box::new(simplifier);
    self
  }

  /// Set the tolerance used by [`GeoLoader::load_simplified`].
  pub fn with_default_tolerance(mut self, tolerance: Tolerance) -> Self {
    self.default_tolerance = tolerance;
    self
  }

  pub fn with_corrupt_policy(mut self, on_corrupt: CorruptEntryPolicy) -> Self {
    self.cache = self.cache.with_corrupt_policy(on_corrupt);
    self
  }

  /// Load `source`, from cache when a fresh entry exists.
  pub fn load(&self, source: &Path, simplification: Simplification) -> Result<FeatureTable> {
    self.fetch(source, simplification).map(|r| r.data)
  }

  /// Load `source` simplified with the default tolerance.
  pub fn load_simplified(&self, source: &Path) -> Result<FeatureTable> {
    self.load(source, Simplification::Tolerance(self.default_tolerance))
  }

  /// Like [`GeoLoader::load`], also reporting where the data came from.
  pub fn fetch(
    &self,
    source: &Path,
    simplification: Simplification,
  ) -> Result<CacheResult<FeatureTable>> {
    self.cache.prepare()?;

    let key = CacheKey::derive(source, simplification)?;
    tracing::debug!("Cache key for {}: {}", source.display(), key.name());

    let source_modified = std::fs::metadata(source)
      .and_then(|m| m.modified())
      .map_err(|e| Error::SourceAccess {
        path: source.to_path_buf(),
        source: e,
      })?;

    self.cache.fetch(&key, source, source_modified, || {
      self.parse_and_simplify(source, simplification)
    })
  }

  fn parse_and_simplify(
    &self,
    source: &Path,
    simplification: Simplification,
  ) -> Result<FeatureTable> {
    tracing::info!("Reading {} ...", source.display());
    let mut table = self.parser.parse(source)?;

    match simplification {
      Simplification::None => {}
      Simplification::Tolerance(tolerance) => {
        tracing::info!(
          "Simplifying {} records with tolerance {}",
          table.len(),
          tolerance
        );
        for (index, record) in table.records.iter_mut().enumerate() {
          if let Some(geometry) = record.geometry.as_ref() {
            let simplified = self
              .simplifier
              .simplify(geometry, tolerance)
              .map_err(|source| Error::Simplify { index, source })?;
            record.geometry = Some(simplified);
          }
        }
      }
    }

    Ok(table)
  }
}

//! Cache layer that orchestrates freshness checks around producing a table.

use serde::Deserialize;
use std::path::Path;
use std::time::SystemTime;

use super::storage::{CacheStorage, Lookup};
use super::traits::{CacheKey, CacheResult, CacheSource};
use crate::error::Result;
use crate::geometry::FeatureTable;

/// What to do with a cache entry that exists but cannot be decoded.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CorruptEntryPolicy {
  /// Treat it as a miss: re-parse and overwrite the entry
  #[default]
  Regenerate,
  /// Return the decode error to the caller
  Fail,
}

/// Cache layer that manages freshness logic in front of a producer.
///
/// An entry is served only while its modification time is strictly newer
/// than the source file's. Anything else runs the producer and overwrites
/// the entry.
pub struct CacheLayer<S: CacheStorage> {
  storage: S,
  on_corrupt: CorruptEntryPolicy,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage,
      on_corrupt: CorruptEntryPolicy::default(),
    }
  }

  /// Set how undecodable entries are handled.
  pub fn with_corrupt_policy(mut self, on_corrupt: CorruptEntryPolicy) -> Self {
    self.on_corrupt = on_corrupt;
    self
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Make sure the storage backend is ready (creates the cache directory).
  pub fn prepare(&self) -> Result<()> {
    self.storage.prepare()
  }

  /// Fetch a table with a cache-first strategy.
  ///
  /// 1. If a fresh entry exists, decode and return it
  /// 2. Otherwise run `produce`
  /// 3. Store the produced table, replacing any previous entry
  pub fn fetch<F>(
    &self,
    key: &CacheKey,
    source: &Path,
    source_modified: SystemTime,
    produce: F,
  ) -> Result<CacheResult<FeatureTable>>
  where
    F: FnOnce() -> Result<FeatureTable>,
  {
    let miss = match self.storage.modified(key)? {
      None => CacheSource::Missing,
      Some(entry_modified) if !is_fresh(entry_modified, source_modified) => {
        tracing::debug!("Cache entry {} is not newer than its source", key.name());
        CacheSource::Stale
      }
      Some(_) => match self.storage.get(key) {
        Ok(Lookup::Found(entry)) => {
          tracing::info!("Loading from cache: {}", key.name());
          return Ok(CacheResult::from_cache(entry.table, entry.cached_at));
        }
        // Removed between the timestamp check and the read
        Ok(Lookup::Missing) => CacheSource::Missing,
        Ok(Lookup::Incompatible { version }) => {
          tracing::debug!(
            "Cache entry {} has format version {}, regenerating",
            key.name(),
            version
          );
          CacheSource::Incompatible
        }
        Err(e) if e.is_corrupt_entry() && self.on_corrupt == CorruptEntryPolicy::Regenerate => {
          tracing::warn!(error = %e, "Regenerating corrupt cache entry");
          CacheSource::Corrupt
        }
        Err(e) => return Err(e),
      },
    };

    let data = produce()?;

    tracing::info!("Saving to cache: {}", key.name());
    self.storage.store(key, source, &data)?;

    Ok(CacheResult::from_source(data, miss))
  }
}

/// An entry is fresh only when strictly newer than its source.
fn is_fresh(entry_modified: SystemTime, source_modified: SystemTime) -> bool {
  entry_modified > source_modified
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::FileStorage;
  use crate::error::Error;
  use crate::geometry::{Record, Simplification};
  use std::cell::Cell;
  use std::time::Duration;

  fn table(n: usize) -> FeatureTable {
    FeatureTable::new(
      (0..n)
        .map(|i| Record {
          id: Some(serde_json::Value::from(i)),
          properties: geojson::JsonObject::new(),
          geometry: None,
        })
        .collect(),
    )
  }

  fn setup() -> (tempfile::TempDir, CacheLayer<FileStorage>, CacheKey) {
    let dir = tempfile::tempdir().unwrap();
    let layer = CacheLayer::new(FileStorage::open(dir.path().join("cache")).unwrap());
    let key = CacheKey::derive(Path::new("regions.geojson"), Simplification::None).unwrap();
    (dir, layer, key)
  }

  fn an_hour_ago() -> SystemTime {
    SystemTime::now() - Duration::from_secs(3600)
  }

  #[test]
  fn test_is_fresh_is_strict() {
    let t = SystemTime::now();
    assert!(!is_fresh(t, t));
    assert!(is_fresh(t + Duration::from_secs(1), t));
    assert!(!is_fresh(t, t + Duration::from_secs(1)));
  }

  #[test]
  fn test_fresh_entry_skips_producer() {
    let (_dir, layer, key) = setup();
    let calls = Cell::new(0);
    let produce = || {
      calls.set(calls.get() + 1);
      Ok(table(3))
    };

    let first = layer
      .fetch(&key, Path::new("regions.geojson"), an_hour_ago(), produce)
      .unwrap();
    assert_eq!(first.source, CacheSource::Missing);
    assert!(first.cached_at.is_none());

    let second = layer
      .fetch(&key, Path::new("regions.geojson"), an_hour_ago(), || {
        calls.set(calls.get() + 1);
        Ok(table(3))
      })
      .unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert!(second.cached_at.is_some());
    assert_eq!(second.data, first.data);
    assert_eq!(calls.get(), 1);
  }

  #[test]
  fn test_newer_source_is_stale() {
    let (_dir, layer, key) = setup();
    layer
      .fetch(&key, Path::new("regions.geojson"), an_hour_ago(), || Ok(table(1)))
      .unwrap();

    let later = SystemTime::now() + Duration::from_secs(60);
    let result = layer
      .fetch(&key, Path::new("regions.geojson"), later, || Ok(table(2)))
      .unwrap();

    assert_eq!(result.source, CacheSource::Stale);
    assert_eq!(result.data.len(), 2);
  }

  #[test]
  fn test_corrupt_entry_regenerates_by_default() {
    let (_dir, layer, key) = setup();
    std::fs::write(layer.storage().entry_path(&key), b"garbage").unwrap();

    let result = layer
      .fetch(&key, Path::new("regions.geojson"), an_hour_ago(), || Ok(table(4)))
      .unwrap();

    assert_eq!(result.source, CacheSource::Corrupt);
    assert_eq!(result.data.len(), 4);
  }

  #[test]
  fn test_corrupt_entry_fails_with_fail_policy() {
    let (_dir, layer, key) = setup();
    let layer = layer.with_corrupt_policy(CorruptEntryPolicy::Fail);
    std::fs::write(layer.storage().entry_path(&key), b"garbage").unwrap();

    let err = layer
      .fetch(&key, Path::new("regions.geojson"), an_hour_ago(), || Ok(table(4)))
      .unwrap_err();

    assert!(err.is_corrupt_entry());
  }

  #[test]
  fn test_producer_error_writes_nothing() {
    let (_dir, layer, key) = setup();
    let err = layer
      .fetch(&key, Path::new("regions.geojson"), an_hour_ago(), || {
        Err(Error::InvalidTolerance(-1.0))
      })
      .unwrap_err();

    assert!(matches!(err, Error::InvalidTolerance(_)));
    assert!(!layer.storage().entry_path(&key).exists());
  }

  #[test]
  fn test_policy_deserializes_lowercase() {
    let policy: CorruptEntryPolicy = serde_yaml::from_str("fail").unwrap();
    assert_eq!(policy, CorruptEntryPolicy::Fail);
  }
}

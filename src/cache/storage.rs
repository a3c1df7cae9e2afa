//! Cache storage trait and on-disk implementation.
//!
//! # Entry format
//!
//! ```text
//! <cache_dir>/<key>.geocache
//!   {"format":"geocache","version":1,...,"digest":"sha256:..."}\n   header line
//!   {"records":[...]}                                                payload
//! ```
//!
//! The header carries the format version and a SHA-256 digest of the payload.
//! A version mismatch reads as an absent entry; anything else that fails to
//! decode is reported as [`Error::CorruptEntry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::traits::CacheKey;
use crate::error::{Error, Result};
use crate::geometry::{FeatureTable, Simplification};

/// Format tag written at the start of every entry.
pub const CACHE_FORMAT: &str = "geocache";

/// Bumped whenever the header or payload layout changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// File extension of cache entries.
pub const CACHE_EXTENSION: &str = "geocache";

/// A decoded cache entry.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  /// The cached collection
  pub table: FeatureTable,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Outcome of looking up an entry.
#[derive(Debug, Clone)]
pub enum Lookup {
  /// Nothing stored under the key
  Missing,
  /// Entry exists but was written by another format version
  Incompatible { version: u32 },
  /// Entry decoded successfully
  Found(CachedEntry),
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Make sure the backend can accept reads and writes.
  fn prepare(&self) -> Result<()>;

  /// Modification time of the entry for `key`, if one exists.
  fn modified(&self, key: &CacheKey) -> Result<Option<SystemTime>>;

  /// Read and decode the entry for `key`.
  fn get(&self, key: &CacheKey) -> Result<Lookup>;

  /// Store `table` under `key`, replacing any previous entry.
  fn store(&self, key: &CacheKey, source: &Path, table: &FeatureTable) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn prepare(&self) -> Result<()> {
    Ok(())
  }

  fn modified(&self, _key: &CacheKey) -> Result<Option<SystemTime>> {
    Ok(None) // Always miss
  }

  fn get(&self, _key: &CacheKey) -> Result<Lookup> {
    Ok(Lookup::Missing)
  }

  fn store(&self, _key: &CacheKey, _source: &Path, _table: &FeatureTable) -> Result<()> {
    Ok(()) // Discard
  }
}

/// Header line of an entry.
#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
  format: String,
  version: u32,
  created_at: DateTime<Utc>,
  source: String,
  simplification: Simplification,
  record_count: usize,
  digest: String,
}

/// The part of the header every format version must keep.
#[derive(Debug, Deserialize)]
struct HeaderVersion {
  format: String,
  version: u32,
}

/// File-per-entry storage rooted at a cache directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
  root: PathBuf,
}

impl FileStorage {
  /// Open storage at `root`, creating the directory (and parents) if needed.
  pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
    let storage = Self { root: root.into() };
    storage.prepare()?;
    Ok(storage)
  }

  /// Path of the entry for `key`.
  pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
    self
      .root
      .join(format!("{}.{}", key.name(), CACHE_EXTENSION))
  }
}

impl CacheStorage for FileStorage {
  fn prepare(&self) -> Result<()> {
    std::fs::create_dir_all(&self.root).map_err(|e| Error::CacheDir {
      path: self.root.clone(),
      source: e,
    })
  }

  fn modified(&self, key: &CacheKey) -> Result<Option<SystemTime>> {
    let path = self.entry_path(key);
    match std::fs::metadata(&path).and_then(|m| m.modified()) {
      Ok(time) => Ok(Some(time)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(Error::CacheRead { path, source: e }),
    }
  }

  fn get(&self, key: &CacheKey) -> Result<Lookup> {
    let path = self.entry_path(key);
    let bytes = match std::fs::read(&path) {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Lookup::Missing),
      Err(e) => return Err(Error::CacheRead { path, source: e }),
    };

    decode_entry(&bytes).map_err(|reason| Error::CorruptEntry { path, reason })
  }

  fn store(&self, key: &CacheKey, source: &Path, table: &FeatureTable) -> Result<()> {
    let path = self.entry_path(key);
    let bytes = encode_entry(source, key.simplification(), table)?;

    // Write atomically via temp file
    let temp_path = path.with_extension("tmp");
    if let Err(e) = std::fs::write(&temp_path, &bytes) {
      let _ = std::fs::remove_file(&temp_path);
      return Err(Error::CacheWrite {
        path: temp_path,
        source: e,
      });
    }
    if let Err(e) = std::fs::rename(&temp_path, &path) {
      let _ = std::fs::remove_file(&temp_path);
      return Err(Error::CacheWrite { path, source: e });
    }

    Ok(())
  }
}

fn payload_digest(payload: &[u8]) -> String {
  format!("sha256:{}", hex::encode(Sha256::digest(payload)))
}

fn encode_entry(
  source: &Path,
  simplification: Simplification,
  table: &FeatureTable,
) -> Result<Vec<u8>> {
  let payload = serde_json::to_vec(table)?;
  let header = EntryHeader {
    format: CACHE_FORMAT.to_string(),
    version: CACHE_FORMAT_VERSION,
    created_at: Utc::now(),
    source: source.display().to_string(),
    simplification,
    record_count: table.len(),
    digest: payload_digest(&payload),
  };

  // Compact JSON never contains a raw newline, so it can end the header.
  let mut bytes = serde_json::to_vec(&header)?;
  bytes.push(b'\n');
  bytes.extend_from_slice(&payload);
  Ok(bytes)
}

fn decode_entry(bytes: &[u8]) -> std::result::Result<Lookup, String> {
  let split = bytes
    .iter()
    .position(|&b| b == b'\n')
    .ok_or_else(|| "missing header line".to_string())?;
  let (header_bytes, payload) = (&bytes[..split], &bytes[split + 1..]);

  let tag: HeaderVersion =
    serde_json::from_slice(header_bytes).map_err(|e| format!("unreadable header: {}", e))?;
  if tag.format != CACHE_FORMAT {
    return Err(format!("unknown format tag '{}'", tag.format));
  }
  if tag.version != CACHE_FORMAT_VERSION {
    return Ok(Lookup::Incompatible {
      version: tag.version,
    });
  }

  let header: EntryHeader =
    serde_json::from_slice(header_bytes).map_err(|e| format!("unreadable header: {}", e))?;

  let digest = payload_digest(payload);
  if digest != header.digest {
    return Err(format!(
      "digest mismatch: expected {}, got {}",
      header.digest, digest
    ));
  }

  let table: FeatureTable =
    serde_json::from_slice(payload).map_err(|e| format!("unreadable payload: {}", e))?;
  if table.len() != header.record_count {
    return Err(format!(
      "record count mismatch: header says {}, payload has {}",
      header.record_count,
      table.len()
    ));
  }

  Ok(Lookup::Found(CachedEntry {
    table,
    cached_at: header.created_at,
  }))
}

//! Error types for loading, simplifying and caching geometry files.

use std::io;
use std::path::PathBuf;

/// Result alias used across the loader, cache and geometry modules.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Loader errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Source file is missing or unreadable.
  #[error("cannot access source {}: {source}", path.display())]
  SourceAccess { path: PathBuf, source: io::Error },

  /// Source path cannot be turned into a cache key.
  #[error("invalid source path {}: {reason}", path.display())]
  InvalidSource { path: PathBuf, reason: String },

  /// Parser rejected the source content.
  #[error("failed to parse {}: {reason}", path.display())]
  SourceParse { path: PathBuf, reason: String },

  /// Cache directory could not be created.
  #[error("cannot create cache directory {}: {source}", path.display())]
  CacheDir { path: PathBuf, source: io::Error },

  /// Existing cache entry could not be read from disk.
  #[error("cannot read cache entry {}: {source}", path.display())]
  CacheRead { path: PathBuf, source: io::Error },

  /// Cache entry could not be written.
  #[error("cannot write cache entry {}: {source}", path.display())]
  CacheWrite { path: PathBuf, source: io::Error },

  /// Cache entry is present but cannot be decoded.
  #[error("corrupt cache entry {}: {reason}", path.display())]
  CorruptEntry { path: PathBuf, reason: String },

  /// Collection could not be encoded for the cache.
  #[error("failed to encode cache entry: {0}")]
  Encode(#[from] serde_json::Error),

  /// Tolerance is not a finite positive number.
  #[error("invalid simplification tolerance: {0}")]
  InvalidTolerance(f64),

  /// Simplifier rejected a geometry.
  #[error("simplification failed for record {index}: {source}")]
  Simplify {
    index: usize,
    source: SimplifyError,
  },
}

/// Failure reported by a [`Simplifier`](crate::geometry::Simplifier) for one geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct SimplifyError(pub String);

impl Error {
  /// Whether this error came from decoding a cache entry.
  pub fn is_corrupt_entry(&self) -> bool {
    matches!(self, Error::CorruptEntry { .. })
  }
}

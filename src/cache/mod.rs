//! Disk cache for parsed geometry collections.
//!
//! This module provides the caching mechanism that:
//! - Keys entries by source file stem plus simplification tolerance
//! - Serves an entry only while it is newer than its source file
//! - Stores entries in a versioned, digest-checked format
//! - Can be switched off entirely with [`NoopStorage`]

mod layer;
mod storage;
mod traits;

pub use layer::{CacheLayer, CorruptEntryPolicy};
pub use storage::{
  CacheStorage, CachedEntry, FileStorage, Lookup, NoopStorage, CACHE_EXTENSION,
  CACHE_FORMAT_VERSION,
};
pub use traits::{CacheKey, CacheResult, CacheSource};

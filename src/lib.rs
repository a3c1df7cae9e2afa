//! Load GeoJSON vector files through a freshness-checked disk cache, with
//! optional topology-preserving simplification.
//!
//! ```no_run
//! use geocache::{load, load_simplified, Simplification, Tolerance};
//! use std::path::Path;
//!
//! # fn main() -> geocache::Result<()> {
//! // Full detail, cached under ./data/cache
//! let regions = load(Path::new("regions.geojson"), Path::new("data/cache"), Simplification::None)?;
//!
//! // Coarser geometry for quick rendering
//! let quick = load_simplified(Path::new("regions.geojson"), Tolerance::default())?;
//! assert_eq!(regions.len(), quick.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod logging;

use std::path::Path;

pub use config::{CacheConfig, Config, DEFAULT_CACHE_DIR};
pub use error::{Error, Result};
pub use geometry::{FeatureTable, Record, Simplification, Tolerance};
pub use loader::GeoLoader;

/// Load `source` using `cache_dir` as the cache root.
pub fn load(source: &Path, cache_dir: &Path, simplification: Simplification) -> Result<FeatureTable> {
  GeoLoader::open(&CacheConfig::with_dir(cache_dir))?.load(source, simplification)
}

/// Load `source` simplified with `tolerance`, cached under [`DEFAULT_CACHE_DIR`].
///
/// Pass [`Tolerance::default`] for the standard `0.01`.
pub fn load_simplified(source: &Path, tolerance: Tolerance) -> Result<FeatureTable> {
  load(
    source,
    Path::new(DEFAULT_CACHE_DIR),
    Simplification::Tolerance(tolerance),
  )
}

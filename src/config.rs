use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::CorruptEntryPolicy;
use crate::geometry::Tolerance;

/// Cache directory used when nothing else is configured.
pub const DEFAULT_CACHE_DIR: &str = "data/cache";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Root directory for cache entries (created if missing)
  pub dir: PathBuf,
  /// When false, every load parses the source and nothing is written
  pub enabled: bool,
  /// Tolerance used by `load_simplified`
  pub default_tolerance: Tolerance,
  /// Handling of cache entries that exist but cannot be decoded
  pub on_corrupt: CorruptEntryPolicy,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      dir: PathBuf::from(DEFAULT_CACHE_DIR),
      enabled: true,
      default_tolerance: Tolerance::default(),
      on_corrupt: CorruptEntryPolicy::default(),
    }
  }
}

impl CacheConfig {
  /// Default settings rooted at another directory.
  pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      ..Self::default()
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Filter directive used when RUST_LOG is not set (e.g. "info", "geocache=debug")
  pub level: String,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./geocache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/geocache/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        tracing::debug!("No configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("geocache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("geocache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-default config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }
}

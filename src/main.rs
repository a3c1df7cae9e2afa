use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};

use geocache::cache::{CacheStorage, NoopStorage};
use geocache::config::Config;
use geocache::logging;
use geocache::{GeoLoader, Simplification, Tolerance};

#[derive(Parser, Debug)]
#[command(name = "geocache")]
#[command(about = "Load GeoJSON files through a freshness-checked cache")]
#[command(version)]
struct Args {
  /// GeoJSON file to load
  source: PathBuf,

  /// Path to config file (default: ./geocache.yaml or $XDG_CONFIG_HOME/geocache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Cache directory (overrides the config file)
  #[arg(long)]
  cache_dir: Option<PathBuf>,

  /// Simplify geometry with this tolerance
  #[arg(short, long, conflicts_with = "simplify")]
  tolerance: Option<f64>,

  /// Simplify geometry with the configured default tolerance
  #[arg(short, long)]
  simplify: bool,

  /// Parse the source without reading or writing the cache
  #[arg(long)]
  no_cache: bool,

  /// Write the loaded collection as GeoJSON
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration, then apply command line overrides
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(dir) = args.cache_dir {
    config.cache.dir = dir;
  }
  if args.no_cache {
    config.cache.enabled = false;
  }
  if let Some(file) = args.log_file {
    config.log.file = Some(file);
  }

  let _guard = logging::init_logging(&config.log)?;

  let simplification = match (args.tolerance, args.simplify) {
    (Some(t), _) => Simplification::Tolerance(Tolerance::new(t)?),
    (None, true) => Simplification::Tolerance(config.cache.default_tolerance),
    (None, false) => Simplification::None,
  };

  if config.cache.enabled {
    let loader = GeoLoader::open(&config.cache)?;
    run(&loader, &args.source, simplification, args.output.as_deref())
  } else {
    let loader = GeoLoader::with_storage(NoopStorage);
    run(&loader, &args.source, simplification, args.output.as_deref())
  }
}

fn run<S: CacheStorage>(
  loader: &GeoLoader<S>,
  source: &Path,
  simplification: Simplification,
  output: Option<&Path>,
) -> Result<()> {
  let result = loader.fetch(source, simplification)?;
  let table = result.data;

  println!(
    "{}: {} records, {} vertices, from {}",
    source.display(),
    table.len(),
    table.vertex_count(),
    result.source.describe()
  );

  if let Some(path) = output {
    let json = serde_json::to_string(&table.into_feature_collection())
      .map_err(|e| eyre!("Failed to encode GeoJSON: {}", e))?;
    std::fs::write(path, json)
      .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
  }

  Ok(())
}

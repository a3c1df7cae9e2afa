//! Logging setup for the command-line tool.
//!
//! Library code only emits `tracing` events; the binary decides where they go:
//! - stderr by default, so stdout stays clean for summaries
//! - a log file (non-blocking writer) when one is configured
//! - filter from RUST_LOG, else the configured level

use color_eyre::{eyre::eyre, Result};
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer, if any.
pub struct LoggingGuard {
  _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
  let env_filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&config.level))
    .map_err(|e| eyre!("Invalid log level '{}': {}", config.level, e))?;

  match &config.file {
    Some(path) => {
      let (dir, file_name) = split_log_path(path)?;
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

      let file_appender = tracing_appender::rolling::never(dir, file_name);
      let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

      tracing_subscriber::registry()
        .with(env_filter)
        .with(
          tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_file)
            .with_ansi(false),
        )
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {}", e))?;

      Ok(LoggingGuard {
        _file_guard: Some(file_guard),
      })
    }
    None => {
      tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {}", e))?;

      Ok(LoggingGuard { _file_guard: None })
    }
  }
}

fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr)> {
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;
  let dir = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));
  Ok((dir, file_name))
}

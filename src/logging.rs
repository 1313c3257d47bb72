//! Tracing setup: console plus a log file rotated at midnight.

use crate::config::LogLevel;
use crate::error::{CliError, CliResult};
use chrono::{NaiveDate, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

const LOG_PREFIX: &str = "scantag";
const LOG_SUFFIX: &str = "log";

/// Filter used when `RUST_LOG` is unset. The OPC UA stack is very chatty.
pub fn default_directives(level: LogLevel) -> String {
    format!("{},opcua=error", level.as_directive())
}

/// `<dir>/scantag.<YYYY-MM-DD>.log`, the file the appender writes on `date` (UTC).
pub fn log_file_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.{}.{}", LOG_PREFIX, date.format("%Y-%m-%d"), LOG_SUFFIX))
}

/// Appender that starts a new file at every UTC midnight.
fn file_appender(dir: &Path) -> CliResult<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .build(dir)
        .map_err(|e| CliError::Logging(e.to_string()))
}

/// Install the global subscriber. Returns today's log file.
///
/// `verbose` forces DEBUG regardless of the configured level.
pub fn init(level: LogLevel, verbose: bool, log_dir: &Path) -> CliResult<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let appender = file_appender(log_dir)?;

    let level = if verbose { LogLevel::Debug } else { level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(appender))
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    Ok(log_file_path(log_dir, Utc::now().date_naive()))
}

/// Delete `.log` files in `dir` last modified more than `retention_days` ago.
///
/// A missing directory is not an error. Returns how many files were removed.
pub fn cleanup_old_logs(dir: &Path, retention_days: u32) -> io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let keep = Duration::from_secs(u64::from(retention_days) * SECS_PER_DAY);
    let Some(cutoff) = SystemTime::now().checked_sub(keep) else {
        return Ok(0);
    };

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat log file");
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "deleted old log file");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete old log file"),
        }
    }

    if removed > 0 {
        info!(removed, retention_days, "cleaned up old log files");
    }
    Ok(removed)
}

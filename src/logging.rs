//! Tracing initialization.
//! Builds a subscriber with EnvFilter, supports compact or JSON formats, and optional file logging.
//!
//! Behavior:
//! - Log level is driven by LogLevel (no RUST_LOG override here).
//! - Console logs go to stderr; stdout is reserved for the JSON result line.
//! - If `log_file` is provided and passes safety checks, a non-blocking file layer is added.
//!
//! We refuse file logging if any ancestor of the file path is a symlink.

use anyhow::Result;
use chrono::Local;
use relocator::output as out;
use relocator::platform::open_log_file_secure_append;
use relocator::{LogLevel, path_has_symlink_ancestor};
use std::fmt as stdfmt;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;
use tracing_subscriber::util::SubscriberInitExt;

/// Human-friendly timestamp formatter (DD/MM/YY HH:MM:SS)
struct LocalHumanTime;
impl FormatTime for LocalHumanTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> stdfmt::Result {
        write!(w, "{}", Local::now().format("%d/%m/%y %H:%M:%S"))
    }
}

#[inline]
fn to_level_filter(lvl: &LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Normal => LevelFilter::INFO,
        LogLevel::Info => LevelFilter::DEBUG,
        LogLevel::Debug => LevelFilter::TRACE,
    }
}

#[inline]
fn env_filter_from_level(level_filter: LevelFilter) -> EnvFilter {
    let level_str = match level_filter {
        LevelFilter::ERROR => "error",
        LevelFilter::WARN => "warn",
        LevelFilter::INFO => "info",
        LevelFilter::DEBUG => "debug",
        LevelFilter::TRACE => "trace",
        _ => "info",
    };
    EnvFilter::new(level_str)
}

/// Open a non-blocking file writer, or explain on stderr why not.
fn maybe_open_non_blocking_writer(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    match path_has_symlink_ancestor(path) {
        Ok(true) => {
            out::print_warn(&format!(
                "Refusing to enable file logging: ancestor of {} is a symlink",
                path.display()
            ));
            return None;
        }
        Err(e) => {
            out::print_warn(&format!(
                "Cannot check log path {} for symlinks: {e}; file logging disabled",
                path.display()
            ));
            return None;
        }
        Ok(false) => {}
    }

    match open_log_file_secure_append(path) {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(e) => {
            out::print_warn(&format!("Failed to open log file {}: {e}", path.display()));
            None
        }
    }
}

/// Initialize tracing. Returns the file appender's WorkerGuard, which must be held until
/// shutdown to flush logs.
pub fn init_tracing(
    lvl: &LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let env_filter = env_filter_from_level(to_level_filter(lvl));

    if let Some((writer, guard)) = log_file.and_then(maybe_open_non_blocking_writer) {
        if json {
            let console = tsfmt::layer()
                .event_format(tsfmt::format().json())
                .with_timer(LocalHumanTime)
                .with_target(true)
                .with_writer(std::io::stderr);
            let file_layer = tsfmt::layer()
                .event_format(tsfmt::format().json())
                .with_timer(LocalHumanTime)
                .with_target(true)
                .with_writer(writer);
            registry().with(env_filter).with(console).with(file_layer).try_init()?;
        } else {
            let console = tsfmt::layer()
                .with_timer(LocalHumanTime)
                .with_target(false)
                .compact()
                .with_writer(std::io::stderr);
            let file_layer = tsfmt::layer()
                .with_timer(LocalHumanTime)
                .with_target(true)
                .with_ansi(false)
                .compact()
                .with_writer(writer);
            registry().with(env_filter).with(console).with(file_layer).try_init()?;
        }
        return Ok(Some(guard));
    }

    if json {
        let console = tsfmt::layer()
            .event_format(tsfmt::format().json())
            .with_timer(LocalHumanTime)
            .with_target(true)
            .with_writer(std::io::stderr);
        registry().with(env_filter).with(console).try_init()?;
    } else {
        let console = tsfmt::layer()
            .with_timer(LocalHumanTime)
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr);
        registry().with(env_filter).with(console).try_init()?;
    }
    Ok(None)
}

//! Centralized file-based logging system
//!
//! Writes logs to files in logs/ directory, separated by log type:
//! - logs/main.log - General application logs (JSON)
//! - logs/error.log - Error and warning logs only
//! - logs/cache.log - Symbol cache logs
//! - logs/history.log - History buffer logs
//! - logs/collector.log - Stream routing logs

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log targets, one file each
pub const LOG_TARGETS: [&str; 3] = ["cache", "history", "collector"];

/// Initialize centralized file logging
///
/// Creates logs/ directory and sets up file appenders for different log types.
/// The returned guards must be kept alive for the duration of the program.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() -> io::Result<Vec<WorkerGuard>> {
    let logs_dir = Path::new("logs");
    for log_type in ["main", "error"].iter().chain(LOG_TARGETS.iter()) {
        fs::create_dir_all(logs_dir.join(log_type))?;
    }

    let mut guards = Vec::new();

    // Main log - all logs
    let (main_appender, main_guard) = create_appender("logs/main", "main");
    guards.push(main_guard);

    // Error log - ERROR and WARN only
    let (error_appender, error_guard) = create_appender("logs/error", "error");
    guards.push(error_guard);

    let (cache_appender, cache_guard) = create_appender("logs/cache", "cache");
    guards.push(cache_guard);

    let (history_appender, history_guard) = create_appender("logs/history", "history");
    guards.push(history_guard);

    let (collector_appender, collector_guard) = create_appender("logs/collector", "collector");
    guards.push(collector_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let cache_layer = target_layer(cache_appender, "cache");
    let history_layer = target_layer(history_appender, "history");
    let collector_layer = target_layer(collector_appender, "collector");

    // Console layer for development
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(cache_layer)
        .with(history_layer)
        .with(collector_layer)
        .with(console_layer)
        .init();

    tracing::info!(target: "main", "Logging system initialized. Log files in logs/ directory");

    Ok(guards)
}

/// Plain-text layer that only accepts events of one target
fn target_layer<S>(writer: NonBlocking, target: &'static str) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(move |metadata| {
            matches_target(metadata.target(), target)
        }))
}

/// `target` itself or one of its `target::` children
fn matches_target(actual: &str, target: &str) -> bool {
    actual == target
        || actual
            .strip_prefix(target)
            .map_or(false, |rest| rest.starts_with("::"))
}

/// Create a rolling file appender
fn create_appender(dir: &str, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);

    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_cache {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "cache", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_history {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "history", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_collector {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "collector", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}

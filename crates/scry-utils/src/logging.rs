//! # Logging Utilities
//!
//! Logging infrastructure for scry using `tracing`.
//!
//! This module provides structured logging with support for:
//! - Multiple output formats (JSON for production, pretty for development)
//! - Environment variable configuration
//! - Log level filtering
//! - File and console output
//! - Structured fields and spans
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scry_utils::init_logging;
//!
//! // Initialize with default settings (reads from RUST_LOG env var)
//! init_logging().expect("Failed to initialize logging");
//!
//! // Use tracing macros throughout your code
//! tracing::info!("Application started");
//! tracing::debug!("Debug information");
//! tracing::error!("An error occurred");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=scry_core=debug`)
//! - `SCRY_LOG_FORMAT`: Set output format (`json` or `pretty`, default: `pretty`)
//! - `SCRY_LOG_FILE`: Optional path to log file (if not set, logs only to console)

use std::path::PathBuf;
use std::str::FromStr;
use std::{env, io};

use tracing::Level;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default for development)
    Pretty,
    /// JSON format (default for production)
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Initialize logging with default settings
///
/// Reads configuration from environment variables:
/// - `RUST_LOG`: Log level filter (e.g., `debug`, `scry_core=debug`)
/// - `SCRY_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
/// - `SCRY_LOG_FILE`: Optional path to log file
///
/// ## Example
///
/// ```rust,no_run
/// use scry_utils::init_logging;
///
/// init_logging().expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - Invalid environment variable values
/// - File logging fails (if `SCRY_LOG_FILE` is set)
pub fn init_logging() -> Result<(), LoggingError>
{
    // Read format from environment or default to pretty
    let format = env::var("SCRY_LOG_FORMAT")
        .ok()
        .and_then(|s| LogFormat::from_str(&s).ok())
        .unwrap_or(LogFormat::Pretty);

    // Read log level from RUST_LOG or default to INFO
    let default_level = env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse::<LogLevel>()
        .map(Into::into)
        .unwrap_or(Level::INFO);

    init_logging_internal(format, default_level)
}

/// Initialize logging with explicit level and format
///
/// ## Example
///
/// ```rust,no_run
/// use scry_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    init_logging_internal(format, level.into())
}

/// Internal initialization function
#[allow(clippy::unnecessary_wraps)]
fn init_logging_internal(format: LogFormat, default_level: Level) -> Result<(), LoggingError>
{
    // Build environment filter
    // RUST_LOG can override the default level with more specific filters
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    // Check if file logging is requested
    let log_file = env::var("SCRY_LOG_FILE").ok().map(PathBuf::from);

    match format {
        LogFormat::Pretty => {
            let console_layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_writer(io::stdout)
                .with_filter(env_filter.clone());

            if let Some(file_path) = log_file {
                // File logging with pretty format
                let file_appender = tracing_appender::rolling::daily(
                    file_path.parent().unwrap_or(&PathBuf::from(".")),
                    file_path.file_name().unwrap_or_default(),
                );
                let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
                let file_layer = fmt::layer()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false) // No ANSI in files
                    .with_filter(env_filter);

                Registry::default().with(console_layer).with(file_layer).init();
            } else {
                // Console only
                Registry::default().with(console_layer).init();
            }
        }
        LogFormat::Json => {
            let console_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(io::stdout)
                .with_filter(env_filter.clone());

            if let Some(file_path) = log_file {
                // File logging with JSON format
                let file_appender = tracing_appender::rolling::daily(
                    file_path.parent().unwrap_or(&PathBuf::from(".")),
                    file_path.file_name().unwrap_or_default(),
                );
                let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
                let file_layer = fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(env_filter);

                Registry::default().with(console_layer).with(file_layer).init();
            } else {
                // Console only
                Registry::default().with(console_layer).init();
            }
        }
    }

    Ok(())
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

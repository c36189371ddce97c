//! Structured logging using tracing.
//!
//! Console output is human readable and filtered by the verbosity flags,
//! unless `RUST_LOG` is set. With a log directory, a second layer writes
//! JSON lines to a rotating file.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events pass the console filter at the chosen level.
const OWN_TARGETS: [&str; 2] = ["ytsync", "ytsync_core"];

/// Logging configuration options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Maximum log level for console output.
    pub console_level: Level,
    /// Directory for JSON log files; no file output when unset.
    pub log_directory: Option<PathBuf>,
    /// Log file name prefix (e.g. "ytsync" -> "ytsync.2026-01-15").
    pub log_file_prefix: String,
    /// How often to rotate log files.
    pub rotation: LogRotation,
    /// Whether to include ANSI color codes in console output.
    pub console_ansi: bool,
}

/// Log rotation frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// Create a new log file every hour.
    Hourly,
    /// Create a new log file every day.
    Daily,
    /// Never rotate (single log file).
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: Level::INFO,
            log_directory: None,
            log_file_prefix: "ytsync".to_string(),
            rotation: LogRotation::Daily,
            console_ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Set the console log level.
    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    /// Enable JSON file logging in `path`.
    #[must_use]
    pub fn with_log_directory(mut self, path: Option<PathBuf>) -> Self {
        self.log_directory = path;
        self
    }
}

/// Guard that keeps file logging active. Drop this to flush log files.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global subscriber.
///
/// The returned guard must be kept alive for the duration of the program.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created, or if a
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| own_crates_filter(config.console_level))?;

    let console_layer = fmt::layer()
        .with_ansi(config.console_ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (file_layer, file_guard) = match &config.log_directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|e| {
                LoggingError::DirectoryCreationFailed {
                    path: directory.clone(),
                    reason: e.to_string(),
                }
            })?;

            let appender = RollingFileAppender::new(
                config.rotation.into(),
                directory,
                &config.log_file_prefix,
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(own_crates_filter(Level::DEBUG)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// `warn` for dependencies, `level` for this tool's own crates.
fn own_crates_filter(level: Level) -> Result<EnvFilter, LoggingError> {
    let base = if level < Level::WARN { level } else { Level::WARN };
    let mut filter = EnvFilter::new(level_to_directive(base));
    for target in OWN_TARGETS {
        let directive = format!("{target}={}", level_to_directive(level));
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|_| LoggingError::InvalidDirective(directive.clone()))?,
        );
    }
    Ok(filter)
}

/// Convert a tracing Level to a filter directive string.
const fn level_to_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create the log directory.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// The path that could not be created.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// A filter directive did not parse.
    #[error("Invalid log filter directive '{0}'")]
    InvalidDirective(String),

    /// A global subscriber was already set.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

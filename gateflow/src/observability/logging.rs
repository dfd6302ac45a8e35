//! Subscriber installation for binaries and demos.

use crate::errors::GateflowError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Log files are named `app.<date>.log`.
pub const LOG_FILE_PREFIX: &str = "app";
const LOG_FILE_SUFFIX: &str = "log";
/// Rotated log files kept besides the live one.
pub const DEFAULT_LOG_BACKUPS: usize = 7;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_directive")]
    pub default_directive: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for a daily-rotated log file, written next to the console.
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
    /// Rotated files kept besides the live one.
    #[serde(default = "default_backups")]
    pub backups: usize,
}

fn default_directive() -> String {
    "info".to_string()
}

const fn default_backups() -> usize {
    DEFAULT_LOG_BACKUPS
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_directive: default_directive(),
            format: LogFormat::Text,
            file_dir: None,
            backups: DEFAULT_LOG_BACKUPS,
        }
    }
}

impl LogConfig {
    /// Sets the default filter directive.
    #[must_use]
    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Also writes plain-text logs to a daily-rotated file in `dir`.
    #[must_use]
    pub fn with_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_dir = Some(dir.into());
        self
    }

    /// Sets how many rotated files are kept.
    #[must_use]
    pub fn with_backups(mut self, backups: usize) -> Self {
        self.backups = backups;
        self
    }
}

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` wins over `config.default_directive`. With a `file_dir`, the
/// same events also go to `app.<date>.log` there, rotated at midnight.
/// Returns `Ok(false)` when a global subscriber was already installed; that
/// is not an error.
///
/// # Errors
///
/// Returns an IO error if the log directory cannot be created.
pub fn init_logging(config: &LogConfig) -> Result<bool, GateflowError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_directive));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match config.format {
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    });
    if let Some(dir) = &config.file_dir {
        let appender = file_appender(dir, config.backups)?;
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(appender)
                .boxed(),
        );
    }

    Ok(tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .is_ok())
}

fn file_appender(dir: &Path, backups: usize) -> Result<RollingFileAppender, GateflowError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(backups + 1)
        .build(dir)
        .map_err(|e| GateflowError::Io(std::io::Error::other(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::default()
            .with_default_directive("gateflow=debug")
            .with_format(LogFormat::Json);

        assert_eq!(config.default_directive, "gateflow=debug");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        let config = LogConfig::default().with_default_directive("warn");
        init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }

    #[test]
    fn test_file_appender_writes_dated_file() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let mut appender = file_appender(&logs, DEFAULT_LOG_BACKUPS).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(&logs)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("app.") && names[0].ends_with(".log"));
    }

    #[test]
    fn test_log_config_file_dir() {
        let config = LogConfig::default().with_file_dir("logs").with_backups(3);
        assert_eq!(config.file_dir, Some(PathBuf::from("logs")));
        assert_eq!(config.backups, 3);
        assert_eq!(LogConfig::default().file_dir, None);
    }
}

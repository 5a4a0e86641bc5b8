//! Logging setup shared by Tollgate binaries.
//!
//! Everything logs through `tracing`; this crate only decides how events are
//! filtered and rendered. The filter comes from `RUST_LOG` when set, otherwise
//! from [`LogSettings::level`].

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Minimum level for emitted events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, LogError> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LogError::InvalidLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = LogError;

    fn try_from(value: String) -> Result<Self, LogError> {
        value.parse()
    }
}

impl From<LogLevel> for tracing_subscriber::filter::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human oriented.
    #[default]
    Pretty,
    /// Single line per event.
    Compact,
    /// One JSON object per event.
    Json,
}

/// Logging settings, usually read from the `[logging]` config section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    /// Include file and line in each event.
    #[serde(default)]
    pub source_location: bool,
}

impl LogSettings {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed, which happens when tests
/// initialise logging more than once.
pub fn init(settings: &LogSettings) -> Result<(), LogError> {
    let registry = tracing_subscriber::registry().with(settings.filter());

    let result = match settings.format {
        LogFormat::Pretty => registry
            .with(
                tfmt::layer()
                    .with_target(true)
                    .with_file(settings.source_location)
                    .with_line_number(settings.source_location),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(tfmt::layer().compact().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tfmt::layer().json().with_current_span(true))
            .try_init(),
    };

    result.map_err(|e| LogError::InitError(e.to_string()))
}

/// Logging errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to initialize logging: {0}")]
    InitError(String),

    #[error("invalid log level: {0}")]
    InvalidLevel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parse() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!(matches!(
            "loud".parse::<LogLevel>(),
            Err(LogError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_log_level_try_from_string() {
        assert_eq!(LogLevel::try_from("trace".to_string()).unwrap(), LogLevel::Trace);
        assert!(matches!(
            LogLevel::try_from(String::from("verbose")),
            Err(LogError::InvalidLevel(level)) if level == "verbose"
        ));
    }

    #[test]
    fn test_log_level_filter() {
        use tracing_subscriber::filter::LevelFilter;
        assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
    }

    #[test]
    fn test_settings_deserialize() {
        let settings: LogSettings =
            serde_json::from_str(r#"{"level": "warn", "format": "json"}"#).unwrap();
        assert_eq!(settings.level, LogLevel::Warn);
        assert_eq!(settings.format, LogFormat::Json);
        assert!(!settings.source_location);
    }

    #[test]
    fn test_settings_reject_unknown_level() {
        let result = serde_json::from_str::<LogSettings>(r#"{"level": "chatty"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = LogSettings::default();
        assert_eq!(settings.level, LogLevel::Info);
        assert_eq!(settings.format, LogFormat::Pretty);
    }
}

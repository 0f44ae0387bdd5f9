//! Core error types for Vigil.
//!
//! Nothing in this module is raised by the telemetry operations themselves;
//! these errors surface only while loading configuration or parsing names
//! that arrive as text (config files, recorded traces, CLI arguments).

use thiserror::Error;

/// Top-level error type for Vigil core operations.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Error while loading or validating configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error while parsing a metric or entry name.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Errors while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The sample rate is outside `[0, 1]` or not a number.
    #[error("Invalid sample rate {0}: must be a finite number in [0, 1]")]
    InvalidSampleRate(f64),

    /// A threshold pair is not ordered or not finite.
    #[error(
        "Invalid threshold for {metric}: good={good}, needs_improvement={needs_improvement}"
    )]
    InvalidThreshold {
        /// Metric the threshold belongs to.
        metric: String,
        /// Upper bound of the "good" band.
        good: f64,
        /// Upper bound of the "needs improvement" band.
        needs_improvement: f64,
    },

    /// A detection threshold is negative or not finite.
    #[error("Invalid {name}: {value}")]
    InvalidDetectionThreshold {
        /// Name of the setting.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// IO error reading a configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors while parsing names that arrive as text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Unknown Web Vitals metric name.
    #[error("Unknown metric: '{0}'")]
    UnknownMetric(String),

    /// Unknown performance entry type.
    #[error("Unknown entry type: '{0}'")]
    UnknownEntryType(String),

    /// Unknown rating label.
    #[error("Unknown rating: '{0}'")]
    UnknownRating(String),
}

/// Result type alias for Vigil core operations.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for parse operations.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

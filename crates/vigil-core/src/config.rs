//! Configuration types for the Vigil telemetry core.
//!
//! Configuration is supplied once when a monitor is constructed and is
//! immutable afterwards. It can be built in code with the `with_*` methods
//! or loaded from a TOML file:
//!
//! ```toml
//! [sampling]
//! sample_rate = 0.25
//! enable_long_task_detection = true
//!
//! [thresholds.lcp]
//! good = 2000.0
//! needs_improvement = 3500.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::metric::{MetricName, Thresholds};

/// Sampling and optional-feature switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Probability in `[0, 1]` that an event is forwarded to the sink.
    pub sample_rate: f64,

    /// Subscribe to long-task entries and flag slow main-thread work.
    pub enable_long_task_detection: bool,

    /// Allow heap usage snapshots through `measure_memory`.
    pub enable_memory_monitoring: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            enable_long_task_detection: true,
            enable_memory_monitoring: false,
        }
    }
}

impl SamplingConfig {
    /// Create a sampling configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sample rate, clamped into `[0, 1]`.
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self
    }

    /// Enable or disable long-task detection.
    pub fn with_long_task_detection(mut self, enabled: bool) -> Self {
        self.enable_long_task_detection = enabled;
        self
    }

    /// Enable or disable memory monitoring.
    pub fn with_memory_monitoring(mut self, enabled: bool) -> Self {
        self.enable_memory_monitoring = enabled;
        self
    }

    /// Preset for production traffic: one event in ten, no extras.
    pub fn production() -> Self {
        Self {
            sample_rate: 0.1,
            enable_long_task_detection: false,
            enable_memory_monitoring: false,
        }
    }

    /// Preset for local development: everything on.
    pub fn development() -> Self {
        Self {
            sample_rate: 1.0,
            enable_long_task_detection: true,
            enable_memory_monitoring: true,
        }
    }

    /// Check that the sample rate is a finite probability.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.sample_rate.is_finite() || !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        Ok(())
    }
}

/// Complete monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling and feature switches.
    pub sampling: SamplingConfig,

    /// Rating thresholds per metric.
    pub thresholds: Thresholds,

    /// Long tasks above this duration (ms) are flagged.
    ///
    /// Defaults to 50ms.
    pub long_task_threshold_ms: f64,

    /// Resources slower than this (ms) are flagged.
    ///
    /// Defaults to 1000ms.
    pub slow_resource_threshold_ms: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            thresholds: Thresholds::default(),
            long_task_threshold_ms: 50.0,
            slow_resource_threshold_ms: 1000.0,
        }
    }
}

impl MonitorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampling configuration.
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Set the thresholds table.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the long-task threshold.
    pub fn with_long_task_threshold(mut self, millis: f64) -> Self {
        self.long_task_threshold_ms = millis;
        self
    }

    /// Set the slow-resource threshold.
    pub fn with_slow_resource_threshold(mut self, millis: f64) -> Self {
        self.slow_resource_threshold_ms = millis;
        self
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: MonitorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        debug!(path = %path.display(), "Loading monitor configuration");
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate every field.
    pub fn validate(&self) -> ConfigResult<()> {
        self.sampling.validate()?;

        for name in MetricName::ALL {
            let threshold = self.thresholds.get(name);
            if !threshold.is_valid() {
                return Err(ConfigError::InvalidThreshold {
                    metric: name.label().to_string(),
                    good: threshold.good,
                    needs_improvement: threshold.needs_improvement,
                });
            }
        }

        for (name, value) in [
            ("long_task_threshold_ms", self.long_task_threshold_ms),
            ("slow_resource_threshold_ms", self.slow_resource_threshold_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidDetectionThreshold { name, value });
            }
        }

        Ok(())
    }
}

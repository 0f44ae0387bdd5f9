//! Web Vitals metric names, ratings and the thresholds table.
//!
//! Ratings are never stored. They are derived on demand from a value and its
//! [`Threshold`] through [`classify`], a pure function.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// One of the closed set of Web Vitals metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricName {
    /// Largest Contentful Paint.
    Lcp,
    /// First Input Delay.
    Fid,
    /// Cumulative Layout Shift.
    Cls,
    /// First Contentful Paint.
    Fcp,
    /// Time To First Byte.
    Ttfb,
    /// Interaction to Next Paint.
    Inp,
}

impl MetricName {
    /// Every metric, in reporting order.
    pub const ALL: [MetricName; 6] = [
        MetricName::Lcp,
        MetricName::Fid,
        MetricName::Cls,
        MetricName::Fcp,
        MetricName::Ttfb,
        MetricName::Inp,
    ];

    /// Lowercase name, as used for sink event names and snapshot keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Lcp => "lcp",
            MetricName::Fid => "fid",
            MetricName::Cls => "cls",
            MetricName::Fcp => "fcp",
            MetricName::Ttfb => "ttfb",
            MetricName::Inp => "inp",
        }
    }

    /// Uppercase acronym for display.
    pub fn label(&self) -> &'static str {
        match self {
            MetricName::Lcp => "LCP",
            MetricName::Fid => "FID",
            MetricName::Cls => "CLS",
            MetricName::Fcp => "FCP",
            MetricName::Ttfb => "TTFB",
            MetricName::Inp => "INP",
        }
    }

    /// Unit of the metric's raw value.
    pub fn unit(&self) -> MetricUnit {
        match self {
            MetricName::Cls => MetricUnit::Score,
            _ => MetricUnit::Milliseconds,
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for MetricName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::UnknownMetric(s.to_string()))
    }
}

/// Unit of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricUnit {
    /// Milliseconds since navigation start.
    Milliseconds,
    /// Unitless accumulated score.
    Score,
}

impl MetricUnit {
    /// Short suffix for display.
    pub fn suffix(&self) -> &'static str {
        match self {
            MetricUnit::Milliseconds => "ms",
            MetricUnit::Score => "",
        }
    }
}

/// Quality band a metric value falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    /// At or below the "good" bound.
    Good,
    /// Above "good", at or below the "needs improvement" bound.
    NeedsImprovement,
    /// Above the "needs improvement" bound.
    Poor,
}

impl Rating {
    /// Label used in sink payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "good" => Ok(Rating::Good),
            "needs-improvement" => Ok(Rating::NeedsImprovement),
            "poor" => Ok(Rating::Poor),
            other => Err(ParseError::UnknownRating(other.to_string())),
        }
    }
}

/// Upper bounds of the "good" and "needs improvement" bands for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Values at or below this are rated good.
    pub good: f64,
    /// Values at or below this (and above `good`) need improvement.
    pub needs_improvement: f64,
}

impl Threshold {
    /// Create a threshold pair.
    pub const fn new(good: f64, needs_improvement: f64) -> Self {
        Self {
            good,
            needs_improvement,
        }
    }

    /// Rate a value against this threshold.
    pub fn rate(&self, value: f64) -> Rating {
        classify(value, self)
    }

    /// Whether the pair is finite and ordered.
    pub fn is_valid(&self) -> bool {
        self.good.is_finite()
            && self.needs_improvement.is_finite()
            && self.good >= 0.0
            && self.good <= self.needs_improvement
    }
}

/// Classify a value against a threshold pair.
///
/// Both bounds are inclusive: `value == good` is good and
/// `value == needs_improvement` needs improvement. NaN rates poor.
pub fn classify(value: f64, threshold: &Threshold) -> Rating {
    if value <= threshold.good {
        Rating::Good
    } else if value <= threshold.needs_improvement {
        Rating::NeedsImprovement
    } else {
        Rating::Poor
    }
}

/// Thresholds for every metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Largest Contentful Paint (ms).
    pub lcp: Threshold,
    /// First Input Delay (ms).
    pub fid: Threshold,
    /// Cumulative Layout Shift (score).
    pub cls: Threshold,
    /// First Contentful Paint (ms).
    pub fcp: Threshold,
    /// Time To First Byte (ms).
    pub ttfb: Threshold,
    /// Interaction to Next Paint (ms).
    pub inp: Threshold,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            lcp: Threshold::new(2500.0, 4000.0),
            fid: Threshold::new(100.0, 300.0),
            cls: Threshold::new(0.1, 0.25),
            fcp: Threshold::new(1800.0, 3000.0),
            ttfb: Threshold::new(800.0, 1800.0),
            inp: Threshold::new(200.0, 500.0),
        }
    }
}

impl Thresholds {
    /// Create the default thresholds table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the threshold for a metric.
    pub fn get(&self, name: MetricName) -> &Threshold {
        match name {
            MetricName::Lcp => &self.lcp,
            MetricName::Fid => &self.fid,
            MetricName::Cls => &self.cls,
            MetricName::Fcp => &self.fcp,
            MetricName::Ttfb => &self.ttfb,
            MetricName::Inp => &self.inp,
        }
    }

    /// Replace the threshold for a metric.
    pub fn with(mut self, name: MetricName, threshold: Threshold) -> Self {
        let slot = match name {
            MetricName::Lcp => &mut self.lcp,
            MetricName::Fid => &mut self.fid,
            MetricName::Cls => &mut self.cls,
            MetricName::Fcp => &mut self.fcp,
            MetricName::Ttfb => &mut self.ttfb,
            MetricName::Inp => &mut self.inp,
        };
        *slot = threshold;
        self
    }

    /// Rate a value for the given metric.
    pub fn rate(&self, name: MetricName, value: f64) -> Rating {
        classify(value, self.get(name))
    }
}

//! The Web Vitals metric map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use vigil_core::{MetricName, Rating, Thresholds};

/// Latest value per Web Vitals metric.
///
/// Absent metrics are `None` and are left out when serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WebVitals {
    /// Largest Contentful Paint (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcp: Option<f64>,
    /// First Input Delay (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<f64>,
    /// Cumulative Layout Shift (score).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cls: Option<f64>,
    /// First Contentful Paint (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcp: Option<f64>,
    /// Time To First Byte (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttfb: Option<f64>,
    /// Interaction to Next Paint (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inp: Option<f64>,
}

impl WebVitals {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, name: MetricName) -> &mut Option<f64> {
        match name {
            MetricName::Lcp => &mut self.lcp,
            MetricName::Fid => &mut self.fid,
            MetricName::Cls => &mut self.cls,
            MetricName::Fcp => &mut self.fcp,
            MetricName::Ttfb => &mut self.ttfb,
            MetricName::Inp => &mut self.inp,
        }
    }

    /// Value of one metric.
    pub fn get(&self, name: MetricName) -> Option<f64> {
        match name {
            MetricName::Lcp => self.lcp,
            MetricName::Fid => self.fid,
            MetricName::Cls => self.cls,
            MetricName::Fcp => self.fcp,
            MetricName::Ttfb => self.ttfb,
            MetricName::Inp => self.inp,
        }
    }

    /// Overwrite one metric.
    pub fn set(&mut self, name: MetricName, value: f64) {
        *self.slot(name) = Some(value);
    }

    /// Check if no metric is present.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Number of metrics present.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Present metrics in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (MetricName, f64)> + '_ {
        MetricName::ALL
            .into_iter()
            .filter_map(|name| self.get(name).map(|value| (name, value)))
    }

    /// Rating of every present metric.
    pub fn ratings(&self, thresholds: &Thresholds) -> BTreeMap<MetricName, Rating> {
        self.iter()
            .map(|(name, value)| (name, thresholds.rate(name, value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_map() {
        let vitals = WebVitals::new();
        assert!(vitals.is_empty());
        assert_eq!(vitals.get(MetricName::Lcp), None);
        assert_eq!(serde_json::to_string(&vitals).unwrap(), "{}");
    }

    #[test]
    fn test_set_overwrites() {
        let mut vitals = WebVitals::new();
        vitals.set(MetricName::Lcp, 1200.0);
        vitals.set(MetricName::Lcp, 1800.0);
        vitals.set(MetricName::Cls, 0.05);

        assert_eq!(vitals.get(MetricName::Lcp), Some(1800.0));
        assert_eq!(vitals.len(), 2);
        assert_eq!(
            vitals.iter().collect::<Vec<_>>(),
            vec![(MetricName::Lcp, 1800.0), (MetricName::Cls, 0.05)]
        );
    }

    #[test]
    fn test_ratings() {
        let mut vitals = WebVitals::new();
        vitals.set(MetricName::Lcp, 4001.0);
        vitals.set(MetricName::Fid, 30.0);

        let ratings = vitals.ratings(&Thresholds::default());
        assert_eq!(ratings[&MetricName::Lcp], Rating::Poor);
        assert_eq!(ratings[&MetricName::Fid], Rating::Good);
        assert!(!ratings.contains_key(&MetricName::Cls));
    }

    #[test]
    fn test_serializes_present_keys_only() {
        let mut vitals = WebVitals::new();
        vitals.set(MetricName::Ttfb, 120.0);
        let json = serde_json::to_value(vitals).unwrap();
        assert_eq!(json, serde_json::json!({"ttfb": 120.0}));
    }
}

//! Point-in-time telemetry snapshots.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vigil_core::{MetricName, NavigationBreakdown, Rating};
use vigil_host::HeapUsage;

use crate::errors::ErrorReport;
use crate::metrics::WebVitals;

/// Unique identifier for one monitored page lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonitorState {
    /// Constructed, capability check not yet run.
    Uninitialized,
    /// Observers and listeners are registered.
    Active,
    /// The host cannot deliver notifications; every operation is a no-op.
    Inert,
    /// Host registrations were released at page end.
    Disposed,
}

impl MonitorState {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Uninitialized => "uninitialized",
            MonitorState::Active => "active",
            MonitorState::Inert => "inert",
            MonitorState::Disposed => "disposed",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a monitor knows at one moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Session the snapshot belongs to.
    pub session_id: SessionId,
    /// Monitor state when taken.
    pub state: MonitorState,
    /// Metric values.
    pub metrics: WebVitals,
    /// Ratings derived from the metric values.
    pub ratings: BTreeMap<MetricName, Rating>,
    /// Error history, oldest first.
    pub errors: Vec<ErrorReport>,
    /// Heap usage, when memory monitoring is on and the host exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<HeapUsage>,
    /// Navigation phase timings, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationBreakdown>,
}

impl TelemetrySnapshot {
    /// Format as human-readable text.
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Telemetry Snapshot: {}\n", self.session_id));
        output.push_str(&format!("State: {}\n", self.state));

        output.push_str("\nWeb Vitals:\n");
        if self.metrics.is_empty() {
            output.push_str("  (none)\n");
        }
        for (name, value) in self.metrics.iter() {
            let rating = self
                .ratings
                .get(&name)
                .map(|r| r.as_str())
                .unwrap_or("unrated");
            let formatted = match name {
                MetricName::Cls => format!("{:.3}", value),
                _ => format!("{:.0}{}", value, name.unit().suffix()),
            };
            output.push_str(&format!("  {:<5} {:>10}  {}\n", name.label(), formatted, rating));
        }

        if let Some(nav) = &self.navigation {
            output.push_str("\nNavigation:\n");
            for (phase, millis) in nav.phases() {
                output.push_str(&format!("  {:<20} {:>8.1}ms\n", phase, millis));
            }
        }

        if let Some(heap) = &self.memory {
            output.push_str(&format!(
                "\nMemory: {} MB used ({:.1}% of limit)\n",
                heap.used_mb(),
                heap.usage_percent()
            ));
        }

        output.push_str(&format!("\nErrors: {}\n", self.errors.len()));
        for error in &self.errors {
            match &error.component {
                Some(component) => {
                    output.push_str(&format!("  [{}] {}\n", component, error.message))
                }
                None => output.push_str(&format!("  {}\n", error.message)),
            }
        }

        output
    }

    /// Format as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Format as pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::Thresholds;

    fn snapshot() -> TelemetrySnapshot {
        let mut metrics = WebVitals::new();
        metrics.set(MetricName::Lcp, 2600.0);
        metrics.set(MetricName::Cls, 0.04);

        TelemetrySnapshot {
            session_id: SessionId::new(),
            state: MonitorState::Active,
            metrics,
            ratings: metrics.ratings(&Thresholds::default()),
            errors: vec![ErrorReport::new("boom", 0, "agent", "https://example.com/")
                .with_component("Checkout")],
            memory: None,
            navigation: None,
        }
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_to_text() {
        let text = snapshot().to_text();
        assert!(text.contains("State: active"));
        assert!(text.contains("LCP"));
        assert!(text.contains("2600ms"));
        assert!(text.contains("needs-improvement"));
        assert!(text.contains("0.040"));
        assert!(text.contains("[Checkout] boom"));
    }

    #[test]
    fn test_to_json() {
        let json = snapshot().to_json();
        assert_eq!(json["state"], "active");
        assert_eq!(json["metrics"]["lcp"], 2600.0);
        assert_eq!(json["ratings"]["cls"], "good");
        assert_eq!(json["errors"][0]["component"], "Checkout");
        assert!(json.get("memory").is_none());
    }

    #[test]
    fn test_monitor_state_names() {
        assert_eq!(MonitorState::Inert.to_string(), "inert");
        assert_eq!(
            serde_json::to_string(&MonitorState::Uninitialized).unwrap(),
            "\"uninitialized\""
        );
    }
}

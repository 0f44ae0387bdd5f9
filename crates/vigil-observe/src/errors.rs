//! Error reports and the bounded error history.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use tracing::debug;

use vigil_host::{shield, Host, HostFault};

/// Maximum number of reports kept in an [`ErrorHistory`].
pub const ERROR_HISTORY_CAPACITY: usize = 50;

/// A captured application error.
///
/// Reports carry no identity: two identical captures are two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Error message.
    pub message: String,
    /// Stack trace, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Component the error was attributed to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Host user agent at capture time.
    #[serde(default)]
    pub user_agent: String,
    /// Document location at capture time.
    #[serde(default)]
    pub url: String,
}

impl ErrorReport {
    /// Create a report with the given message and context.
    pub fn new(
        message: impl Into<String>,
        timestamp: i64,
        user_agent: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            stack: None,
            component: None,
            timestamp,
            user_agent: user_agent.into(),
            url: url.into(),
        }
    }

    /// Create a report stamped with the host's clock, user agent and location.
    ///
    /// A field the host fails to provide is left empty, or zero for the
    /// timestamp.
    pub fn from_host(host: &dyn Host, message: impl Into<String>) -> Self {
        let timestamp = shielded("now_millis", 0, || host.now_millis());
        let user_agent = shielded("user_agent", String::new(), || host.user_agent());
        let url = shielded("location", String::new(), || host.location());
        Self::new(message, timestamp, user_agent, url)
    }

    /// Build the report for a host fault.
    pub fn from_fault(host: &dyn Host, fault: HostFault) -> Self {
        match fault {
            HostFault::UncaughtException { message, stack } => {
                let mut report = Self::from_host(host, message);
                report.stack = stack;
                report
            }
            HostFault::UnhandledRejection { reason } => {
                Self::from_host(host, format!("Unhandled Promise Rejection: {}", reason))
            }
        }
    }

    /// Attach a stack trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attribute the error to a component.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

fn shielded<T>(operation: &str, fallback: T, read: impl FnOnce() -> T) -> T {
    shield(operation, || Ok(read())).unwrap_or_else(|e| {
        debug!(error = %e, "Host context unavailable");
        fallback
    })
}

/// Append-only history capped at [`ERROR_HISTORY_CAPACITY`] entries.
///
/// Appending past the cap evicts from the front.
#[derive(Debug, Clone, Default)]
pub struct ErrorHistory {
    reports: VecDeque<ErrorReport>,
}

impl ErrorHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            reports: VecDeque::with_capacity(ERROR_HISTORY_CAPACITY),
        }
    }

    /// Append a report, evicting the oldest past capacity.
    ///
    /// Returns the number of evicted reports.
    pub fn push(&mut self, report: ErrorReport) -> usize {
        self.reports.push_back(report);
        let mut evicted = 0;
        while self.reports.len() > ERROR_HISTORY_CAPACITY {
            self.reports.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<ErrorReport> {
        self.reports.iter().cloned().collect()
    }

    /// Remove every report.
    pub fn clear(&mut self) {
        self.reports.clear();
    }

    /// Get the report count.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// The most recent report.
    pub fn last(&self) -> Option<&ErrorReport> {
        self.reports.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vigil_core::{EntryType, PerformanceEntry};
    use vigil_host::{
        BatchCallback, FaultCallback, FaultKind, HostCapabilities, HostResult, Registration,
        SimulatedHost,
    };

    fn report(n: usize) -> ErrorReport {
        ErrorReport::new(format!("error #{}", n), n as i64, "agent", "https://example.com/")
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = ErrorHistory::new();
        for n in 1..=52 {
            history.push(report(n));
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 50);
        assert_eq!(snapshot[0].message, "error #3");
        assert_eq!(snapshot[49].message, "error #52");
        for (i, r) in snapshot.iter().enumerate() {
            assert_eq!(r.message, format!("error #{}", i + 3));
        }
    }

    #[test]
    fn test_history_keeps_duplicates() {
        let mut history = ErrorHistory::new();
        history.push(report(1));
        history.push(report(1));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_clear_then_push() {
        let mut history = ErrorHistory::new();
        history.push(report(1));
        history.push(report(2));

        history.clear();
        assert!(history.is_empty());

        history.push(report(3));
        assert_eq!(history.len(), 1);
        assert_eq!(history.last().unwrap().message, "error #3");
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut history = ErrorHistory::new();
        history.push(report(1));
        let snapshot = history.snapshot();
        history.clear();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_report_from_fault() {
        let host = SimulatedHost::new()
            .with_user_agent("Mozilla/5.0 (Test)")
            .with_location("https://example.com/cart")
            .with_fixed_time(1_700_000_000_000);

        let exception = ErrorReport::from_fault(
            &host,
            HostFault::UncaughtException {
                message: "x is undefined".into(),
                stack: Some("at render (cart.js:10)".into()),
            },
        );
        assert_eq!(exception.message, "x is undefined");
        assert_eq!(exception.stack.as_deref(), Some("at render (cart.js:10)"));
        assert_eq!(exception.timestamp, 1_700_000_000_000);
        assert_eq!(exception.user_agent, "Mozilla/5.0 (Test)");
        assert_eq!(exception.url, "https://example.com/cart");

        let rejection = ErrorReport::from_fault(
            &host,
            HostFault::UnhandledRejection {
                reason: "network down".into(),
            },
        );
        assert_eq!(rejection.message, "Unhandled Promise Rejection: network down");
        assert!(rejection.stack.is_none());
    }

    struct NoUserAgentHost(SimulatedHost);

    impl Host for NoUserAgentHost {
        fn capabilities(&self) -> HostCapabilities {
            self.0.capabilities()
        }

        fn observe(
            &self,
            entry_types: &[EntryType],
            callback: BatchCallback,
        ) -> HostResult<Box<dyn Registration>> {
            self.0.observe(entry_types, callback)
        }

        fn entries_by_type(&self, entry_type: EntryType) -> HostResult<Vec<PerformanceEntry>> {
            self.0.entries_by_type(entry_type)
        }

        fn listen(
            &self,
            kind: FaultKind,
            callback: FaultCallback,
        ) -> HostResult<Box<dyn Registration>> {
            self.0.listen(kind, callback)
        }

        fn user_agent(&self) -> String {
            panic!("navigator is gone")
        }

        fn location(&self) -> String {
            self.0.location()
        }

        fn now_millis(&self) -> i64 {
            self.0.now_millis()
        }
    }

    #[test]
    fn test_report_survives_panicking_host_context() {
        let host = NoUserAgentHost(
            SimulatedHost::new()
                .with_location("https://example.com/cart")
                .with_fixed_time(42),
        );

        let report = ErrorReport::from_fault(
            &host,
            HostFault::UnhandledRejection {
                reason: "timeout".into(),
            },
        );
        assert_eq!(report.message, "Unhandled Promise Rejection: timeout");
        assert_eq!(report.user_agent, "");
        assert_eq!(report.url, "https://example.com/cart");
        assert_eq!(report.timestamp, 42);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let json = serde_json::to_value(report(1).with_component("Checkout")).unwrap();
        assert_eq!(json["userAgent"], "agent");
        assert_eq!(json["component"], "Checkout");
        assert!(json.get("stack").is_none());
    }

    proptest! {
        #[test]
        fn history_never_exceeds_capacity(count in 0usize..200) {
            let mut history = ErrorHistory::new();
            for n in 0..count {
                history.push(report(n));
                prop_assert!(history.len() <= ERROR_HISTORY_CAPACITY);
            }
            prop_assert_eq!(history.len(), count.min(ERROR_HISTORY_CAPACITY));
            if count > 0 {
                prop_assert_eq!(history.last().unwrap().message.clone(), format!("error #{}", count - 1));
            }
        }
    }
}

//! The error collector.

use std::sync::Arc;

use crate::errors::{ErrorHistory, ErrorReport};
use crate::events::{EventDispatcher, TelemetryEvent};
use crate::reporting::Reporter;

/// Appends error reports to the bounded history and offers each one to the
/// reporting pipeline.
pub struct ErrorCollector {
    history: ErrorHistory,
    reporter: Arc<Reporter>,
    events: Arc<EventDispatcher>,
}

impl ErrorCollector {
    /// Create a collector with an empty history.
    pub fn new(reporter: Arc<Reporter>, events: Arc<EventDispatcher>) -> Self {
        Self {
            history: ErrorHistory::new(),
            reporter,
            events,
        }
    }

    /// Append a report.
    pub fn log_error(&mut self, report: ErrorReport) {
        let message = report.message.clone();
        self.reporter.report_error(&report);
        let evicted = self.history.push(report);
        self.events.emit(TelemetryEvent::ErrorCaptured { message, evicted });
    }

    /// Copy of the history, oldest first.
    pub fn errors(&self) -> Vec<ErrorReport> {
        self.history.snapshot()
    }

    /// Empty the history.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Number of reports held.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Check if the history is empty.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl std::fmt::Debug for ErrorCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorCollector")
            .field("len", &self.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vigil_core::{MonitorConfig, SamplingConfig};

    use crate::reporting::{AnalyticsSink, RecordingSink};

    fn setup(sample_rate: f64) -> (ErrorCollector, Arc<RecordingSink>) {
        let config = MonitorConfig::new()
            .with_sampling(SamplingConfig::new().with_sample_rate(sample_rate));
        let sink = Arc::new(RecordingSink::new());
        let reporter =
            Reporter::new(&config).with_sink(Arc::clone(&sink) as Arc<dyn AnalyticsSink>);
        let collector = ErrorCollector::new(Arc::new(reporter), Arc::new(EventDispatcher::new()));
        (collector, sink)
    }

    fn report(n: usize) -> ErrorReport {
        ErrorReport::new(format!("error #{}", n), 0, "agent", "https://example.com/")
    }

    #[test]
    fn test_log_error_keeps_last_fifty() {
        let (mut collector, _) = setup(1.0);
        for n in 1..=52 {
            collector.log_error(report(n));
        }

        let errors = collector.errors();
        assert_eq!(errors.len(), 50);
        assert_eq!(errors.first().unwrap().message, "error #3");
        assert_eq!(errors.last().unwrap().message, "error #52");
    }

    #[test]
    fn test_clear_then_log() {
        let (mut collector, _) = setup(1.0);
        collector.log_error(report(1));
        collector.clear();
        assert!(collector.is_empty());

        collector.log_error(report(2));
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_errors_are_forwarded_after_sampling() {
        let (mut collector, sink) = setup(1.0);
        collector.log_error(report(1));
        assert_eq!(sink.calls_for("exception").len(), 1);

        let (mut collector, sink) = setup(0.0);
        collector.log_error(report(1));
        assert!(sink.is_empty());
        assert_eq!(collector.len(), 1);
    }
}

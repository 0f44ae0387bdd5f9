//! Vigil Observe
//!
//! This crate turns what the host delivers into telemetry:
//!
//! - [`MetricAggregator`]: extracts Web Vitals from entry batches
//! - [`ErrorCollector`]: keeps the last 50 error reports
//! - [`Reporter`]: samples, rates and forwards events to an [`AnalyticsSink`]
//! - [`TelemetryPipeline`]: the single consumer that owns all of the above
//! - [`EventDispatcher`]: diagnostic events for logging and tests
//!
//! # Reporting
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil_core::{MetricName, MonitorConfig};
//! use vigil_observe::{AnalyticsSink, RecordingSink, Reporter};
//!
//! let sink = Arc::new(RecordingSink::new());
//! let reporter = Reporter::new(&MonitorConfig::default())
//!     .with_sink(Arc::clone(&sink) as Arc<dyn AnalyticsSink>);
//!
//! reporter.report(MetricName::Lcp, 1830.0);
//! assert_eq!(sink.calls()[0].payload["metric_rating"], "good");
//! ```
//!
//! # Event Subscription
//!
//! ```ignore
//! use vigil_observe::{EventDispatcher, LoggingSubscriber, TelemetryEvent};
//! use std::sync::Arc;
//!
//! let dispatcher = EventDispatcher::new();
//! dispatcher.subscribe(Arc::new(LoggingSubscriber::new()));
//!
//! dispatcher.emit(TelemetryEvent::MonitorStarted { active: true });
//! ```

pub mod aggregator;
pub mod collector;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod reporting;
pub mod snapshot;

// Re-export main types
pub use aggregator::{MetricAggregator, OBSERVED_ENTRY_TYPES};
pub use collector::ErrorCollector;
pub use errors::{ErrorHistory, ErrorReport, ERROR_HISTORY_CAPACITY};
pub use events::{
    CollectingSubscriber, EventDispatcher, EventSubscriber, LoggingSubscriber, TelemetryEvent,
};
pub use metrics::WebVitals;
pub use pipeline::TelemetryPipeline;
pub use queue::{channel, Signal, SignalQueue, SignalSender};
pub use reporting::{
    normalize, sink_fn, AnalyticsSink, FixedSampler, FnSink, RandomSampler, RecordingSink,
    ReportOutcome, Reporter, Sampler, SequenceSampler, SinkCall, SinkError, ERRORS_CATEGORY,
    WEB_VITALS_CATEGORY,
};
pub use snapshot::{MonitorState, SessionId, TelemetrySnapshot};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::errors::ErrorReport;
    pub use crate::events::{EventDispatcher, EventSubscriber, TelemetryEvent};
    pub use crate::metrics::WebVitals;
    pub use crate::reporting::{AnalyticsSink, RecordingSink, Reporter, Sampler};
    pub use crate::snapshot::{MonitorState, TelemetrySnapshot};
}

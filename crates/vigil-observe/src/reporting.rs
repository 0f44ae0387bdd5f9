//! Sampling, classification and forwarding to the analytics sink.
//!
//! Every event offered to the [`Reporter`] costs one sampling draw. An
//! event is dropped when the draw exceeds the configured sample rate, and
//! always dropped at rate zero; a
//! surviving metric is rated against its threshold and, when a sink is
//! registered, handed to it with a normalized payload. Nothing here
//! returns an error or panics to the caller.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use vigil_core::{MetricName, MonitorConfig, Rating, Thresholds};
use vigil_host::panic_message;

use crate::errors::ErrorReport;
use crate::events::{EventDispatcher, TelemetryEvent};

/// Category attached to forwarded metric events.
pub const WEB_VITALS_CATEGORY: &str = "Web Vitals";

/// Category attached to forwarded error events.
pub const ERRORS_CATEGORY: &str = "Errors";

/// Errors raised by an analytics sink.
///
/// These never reach the caller of [`Reporter::report`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink refused the event.
    #[error("sink rejected event: {0}")]
    Rejected(String),

    /// The sink panicked.
    #[error("sink panicked: {0}")]
    Panicked(String),
}

/// External analytics backend.
///
/// Calls follow a three-argument convention: a command keyword, the event
/// name and a JSON payload.
pub trait AnalyticsSink: Send + Sync {
    /// Deliver one event.
    fn send(&self, command: &str, event: &str, payload: &Value) -> Result<(), SinkError>;
}

/// Adapter turning a closure into an [`AnalyticsSink`].
pub struct FnSink<F>(F);

impl<F> AnalyticsSink for FnSink<F>
where
    F: Fn(&str, &str, &Value) -> Result<(), SinkError> + Send + Sync,
{
    fn send(&self, command: &str, event: &str, payload: &Value) -> Result<(), SinkError> {
        (self.0)(command, event, payload)
    }
}

/// Wrap a closure as an analytics sink.
pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(&str, &str, &Value) -> Result<(), SinkError> + Send + Sync,
{
    FnSink(f)
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkCall {
    /// Command keyword.
    pub command: String,
    /// Event name.
    pub event: String,
    /// Payload as sent.
    pub payload: Value,
}

/// A sink that keeps every call in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    /// Calls for one event name.
    pub fn calls_for(&self, event: &str) -> Vec<SinkCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.event == event)
            .cloned()
            .collect()
    }

    /// Number of calls received.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Check if no call was received.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl AnalyticsSink for RecordingSink {
    fn send(&self, command: &str, event: &str, payload: &Value) -> Result<(), SinkError> {
        self.calls.lock().push(SinkCall {
            command: command.to_string(),
            event: event.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

/// Source of uniform draws in `[0, 1)`.
pub trait Sampler: Send + Sync {
    /// Draw one number.
    fn draw(&self) -> f64;
}

/// Draws from the thread-local random generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn draw(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }
}

/// Always draws the same number.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub f64);

impl Sampler for FixedSampler {
    fn draw(&self) -> f64 {
        self.0
    }
}

/// Replays a fixed sequence of draws, wrapping around at the end.
#[derive(Debug)]
pub struct SequenceSampler {
    draws: Vec<f64>,
    next: AtomicUsize,
}

impl SequenceSampler {
    /// Create a sampler over the given draws.
    ///
    /// An empty sequence always draws `0.0`.
    pub fn new(draws: impl Into<Vec<f64>>) -> Self {
        Self {
            draws: draws.into(),
            next: AtomicUsize::new(0),
        }
    }
}

impl Sampler for SequenceSampler {
    fn draw(&self) -> f64 {
        if self.draws.is_empty() {
            return 0.0;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.draws[i % self.draws.len()]
    }
}

/// What happened to a reported event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The sampling draw dropped the event.
    SampledOut,
    /// The event survived sampling but no sink is registered.
    Classified {
        /// Rating, for metrics.
        rating: Option<Rating>,
    },
    /// The event was handed to the sink.
    Forwarded {
        /// Rating, for metrics.
        rating: Option<Rating>,
    },
}

impl ReportOutcome {
    /// Whether the sink was invoked.
    pub fn is_forwarded(&self) -> bool {
        matches!(self, ReportOutcome::Forwarded { .. })
    }
}

/// Normalize a metric value for the sink.
///
/// CLS becomes an integer per-mille score; every other metric is rounded to
/// whole milliseconds.
pub fn normalize(name: MetricName, value: f64) -> i64 {
    match name {
        MetricName::Cls => (value * 1000.0).round() as i64,
        _ => value.round() as i64,
    }
}

/// The sampling and reporting pipeline.
pub struct Reporter {
    sample_rate: f64,
    thresholds: Thresholds,
    sink: Option<Arc<dyn AnalyticsSink>>,
    sampler: Arc<dyn Sampler>,
    events: Arc<EventDispatcher>,
}

impl Reporter {
    /// Create a reporter with no sink and a random sampler.
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            sample_rate: config.sampling.sample_rate,
            thresholds: config.thresholds.clone(),
            sink: None,
            sampler: Arc::new(RandomSampler),
            events: Arc::new(EventDispatcher::new()),
        }
    }

    /// Register the analytics sink.
    pub fn with_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the sampler.
    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Emit diagnostics through the given dispatcher.
    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = events;
        self
    }

    /// Configured sample rate.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Whether a sink is registered.
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Offer a metric value to the pipeline.
    pub fn report(&self, name: MetricName, value: f64) -> ReportOutcome {
        if !self.sampled_in() {
            self.events.emit(TelemetryEvent::MetricSampledOut {
                name: name.as_str().to_string(),
            });
            return ReportOutcome::SampledOut;
        }

        let rating = self.thresholds.rate(name, value);
        let payload = json!({
            "value": normalize(name, value),
            "event_category": WEB_VITALS_CATEGORY,
            "metric_rating": rating.as_str(),
        });
        self.forward(name.as_str(), &payload, Some(rating))
    }

    /// Offer a captured error to the pipeline.
    pub fn report_error(&self, report: &ErrorReport) -> ReportOutcome {
        if !self.sampled_in() {
            self.events.emit(TelemetryEvent::MetricSampledOut {
                name: "exception".to_string(),
            });
            return ReportOutcome::SampledOut;
        }

        let payload = json!({
            "description": report.message,
            "fatal": false,
            "event_category": ERRORS_CATEGORY,
        });
        self.forward("exception", &payload, None)
    }

    fn sampled_in(&self) -> bool {
        self.sample_rate > 0.0 && self.sampler.draw() <= self.sample_rate
    }

    fn forward(&self, event: &str, payload: &Value, rating: Option<Rating>) -> ReportOutcome {
        let Some(sink) = self.sink.as_ref() else {
            return ReportOutcome::Classified { rating };
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| sink.send("event", event, payload)))
            .unwrap_or_else(|payload| Err(SinkError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => self.events.emit(TelemetryEvent::MetricForwarded {
                name: event.to_string(),
                rating,
            }),
            Err(e) => self.events.emit(TelemetryEvent::SinkFailed {
                name: event.to_string(),
                message: e.to_string(),
            }),
        }
        ReportOutcome::Forwarded { rating }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("sample_rate", &self.sample_rate)
            .field("has_sink", &self.has_sink())
            .finish()
    }
}

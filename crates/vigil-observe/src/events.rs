//! Diagnostic events emitted while the monitor runs.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use vigil_core::{MetricName, Rating};
use vigil_host::HostCapability;

/// Events that can be observed while a monitor runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// The monitor finished its capability check.
    MonitorStarted {
        /// Whether the host can deliver notifications at all.
        active: bool,
    },
    /// A host capability is missing; its feature stays off.
    CapabilityUnavailable {
        /// The missing capability.
        capability: HostCapability,
    },
    /// An observer or listener was registered with the host.
    ObserverRegistered {
        /// What is observed.
        label: String,
    },
    /// A metric value was extracted and stored.
    MetricRecorded {
        /// Metric name.
        name: MetricName,
        /// Stored value.
        value: f64,
    },
    /// The sampling draw dropped an event.
    MetricSampledOut {
        /// Event name.
        name: String,
    },
    /// An event was handed to the analytics sink.
    MetricForwarded {
        /// Event name.
        name: String,
        /// Rating, for metrics.
        rating: Option<Rating>,
    },
    /// The analytics sink failed; the failure was discarded.
    SinkFailed {
        /// Event name.
        name: String,
        /// Failure message.
        message: String,
    },
    /// An error report entered the history.
    ErrorCaptured {
        /// Error message.
        message: String,
        /// Number of reports evicted to make room.
        evicted: usize,
    },
    /// A main-thread task ran past the configured budget.
    LongTaskDetected {
        /// Task duration in milliseconds.
        duration: f64,
        /// Start offset in milliseconds.
        start_time: f64,
    },
    /// A resource took longer than the configured budget.
    SlowResourceDetected {
        /// Resource URL.
        name: String,
        /// Fetch duration in milliseconds.
        duration: f64,
    },
    /// A heap usage sample was taken.
    MemorySampled {
        /// Used heap in bytes.
        used_bytes: u64,
        /// Used heap as a percentage of the limit.
        usage_percent: f64,
    },
    /// Navigation timing was measured.
    NavigationMeasured {
        /// Time to first byte in milliseconds.
        ttfb: f64,
        /// Load completion in milliseconds.
        load_complete: f64,
    },
    /// The monitor released its host registrations.
    MonitorDisposed {
        /// Number of handles disconnected.
        handles: usize,
    },
}

impl TelemetryEvent {
    /// Stable snake_case name, used by filters.
    pub fn event_type(&self) -> &'static str {
        match self {
            TelemetryEvent::MonitorStarted { .. } => "monitor_started",
            TelemetryEvent::CapabilityUnavailable { .. } => "capability_unavailable",
            TelemetryEvent::ObserverRegistered { .. } => "observer_registered",
            TelemetryEvent::MetricRecorded { .. } => "metric_recorded",
            TelemetryEvent::MetricSampledOut { .. } => "metric_sampled_out",
            TelemetryEvent::MetricForwarded { .. } => "metric_forwarded",
            TelemetryEvent::SinkFailed { .. } => "sink_failed",
            TelemetryEvent::ErrorCaptured { .. } => "error_captured",
            TelemetryEvent::LongTaskDetected { .. } => "long_task_detected",
            TelemetryEvent::SlowResourceDetected { .. } => "slow_resource_detected",
            TelemetryEvent::MemorySampled { .. } => "memory_sampled",
            TelemetryEvent::NavigationMeasured { .. } => "navigation_measured",
            TelemetryEvent::MonitorDisposed { .. } => "monitor_disposed",
        }
    }
}

/// Subscriber for telemetry events.
pub trait EventSubscriber: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &TelemetryEvent);

    /// Event types this subscriber wants. `None` receives everything.
    fn event_filter(&self) -> Option<Vec<&'static str>> {
        None
    }
}

/// Writes events to `tracing`.
pub struct LoggingSubscriber;

impl LoggingSubscriber {
    /// Create a new logging subscriber.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for LoggingSubscriber {
    fn on_event(&self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::MonitorStarted { active } => {
                tracing::info!(event = "monitor_started", active = active, "Monitor started");
            }
            TelemetryEvent::CapabilityUnavailable { capability } => {
                tracing::debug!(
                    event = "capability_unavailable",
                    capability = capability.as_str(),
                    "Host capability unavailable"
                );
            }
            TelemetryEvent::ObserverRegistered { label } => {
                tracing::debug!(event = "observer_registered", label = label, "Observer registered");
            }
            TelemetryEvent::MetricRecorded { name, value } => {
                tracing::debug!(
                    event = "metric_recorded",
                    metric = name.as_str(),
                    value = value,
                    "Metric recorded"
                );
            }
            TelemetryEvent::MetricSampledOut { name } => {
                tracing::trace!(event = "metric_sampled_out", name = name, "Event sampled out");
            }
            TelemetryEvent::MetricForwarded { name, rating } => {
                tracing::trace!(
                    event = "metric_forwarded",
                    name = name,
                    rating = rating.map(|r| r.as_str()),
                    "Event forwarded"
                );
            }
            TelemetryEvent::SinkFailed { name, message } => {
                tracing::debug!(
                    event = "sink_failed",
                    name = name,
                    message = message,
                    "Analytics sink failed"
                );
            }
            TelemetryEvent::ErrorCaptured { message, evicted } => {
                tracing::debug!(
                    event = "error_captured",
                    message = message,
                    evicted = evicted,
                    "Error captured"
                );
            }
            TelemetryEvent::LongTaskDetected { duration, start_time } => {
                tracing::warn!(
                    event = "long_task_detected",
                    duration_ms = duration,
                    start_time = start_time,
                    "Long task detected"
                );
            }
            TelemetryEvent::SlowResourceDetected { name, duration } => {
                tracing::warn!(
                    event = "slow_resource_detected",
                    name = name,
                    duration_ms = duration,
                    "Slow resource detected"
                );
            }
            TelemetryEvent::MemorySampled { used_bytes, usage_percent } => {
                tracing::debug!(
                    event = "memory_sampled",
                    used_bytes = used_bytes,
                    usage_percent = usage_percent,
                    "Memory sampled"
                );
            }
            TelemetryEvent::NavigationMeasured { ttfb, load_complete } => {
                tracing::debug!(
                    event = "navigation_measured",
                    ttfb = ttfb,
                    load_complete = load_complete,
                    "Navigation measured"
                );
            }
            TelemetryEvent::MonitorDisposed { handles } => {
                tracing::info!(event = "monitor_disposed", handles = handles, "Monitor disposed");
            }
        }
    }
}

/// Keeps emitted events in memory, up to a cap. Used by tests and the
/// trace replayer.
pub struct CollectingSubscriber {
    events: RwLock<Vec<(Instant, TelemetryEvent)>>,
    max_events: usize,
    filter: Option<Vec<&'static str>>,
}

impl CollectingSubscriber {
    /// Keep at most `max_events`; later events are dropped.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events,
            filter: None,
        }
    }

    /// Only collect the named event types.
    pub fn with_filter(mut self, event_types: &[&'static str]) -> Self {
        self.filter = Some(event_types.to_vec());
        self
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<(Instant, TelemetryEvent)> {
        self.events.read().clone()
    }

    /// Collected events without timestamps.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.read().iter().map(|(_, e)| e.event_type()).collect()
    }

    /// Clear collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventSubscriber for CollectingSubscriber {
    fn on_event(&self, event: &TelemetryEvent) {
        let mut events = self.events.write();
        if events.len() < self.max_events {
            events.push((Instant::now(), event.clone()));
        }
    }

    fn event_filter(&self) -> Option<Vec<&'static str>> {
        self.filter.clone()
    }
}

/// Fans events out to every interested subscriber.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventDispatcher {
    /// Create a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Drop every subscriber.
    pub fn clear_subscribers(&self) {
        self.subscribers.write().clear();
    }

    /// Get subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver an event to each subscriber whose filter accepts it.
    ///
    /// The list is copied first, so a subscriber may subscribe others.
    pub fn emit(&self, event: TelemetryEvent) {
        let subscribers = self.subscribers.read().clone();
        for subscriber in subscribers.iter() {
            if let Some(filter) = subscriber.event_filter() {
                if !filter.contains(&event.event_type()) {
                    continue;
                }
            }
            subscriber.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

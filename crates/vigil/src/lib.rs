//! # Vigil - Web Vitals Telemetry Core
//!
//! Vigil observes the performance entries and uncaught errors a host runtime
//! emits, aggregates them into Web Vitals, keeps a bounded error history and
//! forwards a sampled, rated stream to an analytics sink. It never lets an
//! instrumentation failure reach the host application.
//!
//! ## Features
//!
//! - **Web Vitals**: LCP, FID, CLS, FCP, TTFB and INP from typed entries
//! - **Error capture**: uncaught exceptions and rejections, last 50 kept
//! - **Sampling**: one draw per event against a configured rate
//! - **Graceful degradation**: missing host capabilities switch off only
//!   their own feature
//!
//! ## Quick Start
//!
//! ```ignore
//! use vigil::prelude::*;
//!
//! let host = SimulatedHost::new();
//! let sink = Arc::new(RecordingSink::new());
//!
//! let monitor = Vigil::builder()
//!     .with_sample_rate(0.1)
//!     .with_sink(sink.clone())
//!     .build(host.shared())?;
//!
//! host.deliver(vec![PerformanceEntry::LayoutShift(LayoutShiftEntry::new(0.05, false))]);
//! assert_eq!(monitor.get_metrics().cls, Some(0.05));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Your Application                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                     vigil (Monitor)                     │
//! │                    ┌─────────────────┐                  │
//! │                    │  Vigil Builder  │                  │
//! │                    └────────┬────────┘                  │
//! │                             │                           │
//! │  ┌──────────────┬──────────┴───────┬───────────────┐   │
//! │  │ vigil-core   │ vigil-host       │ vigil-observe │   │
//! │  │ (metrics,    │ (capabilities,   │ (aggregator,  │   │
//! │  │  entries)    │  bridge)         │  reporting)   │   │
//! │  └──────────────┴──────────────────┴───────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                      Host runtime                       │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use vigil_core::{MonitorConfig, SamplingConfig, Thresholds};
use vigil_host::{ObserverBridge, SharedHost};
use vigil_observe::{AnalyticsSink, EventDispatcher, EventSubscriber, Sampler};

mod monitor;

pub use monitor::Monitor;

// Re-export from sub-crates
pub use vigil_core;
pub use vigil_host;
pub use vigil_observe;

pub use vigil_core::{Result, VigilError};

/// Main entry point for Vigil.
pub struct Vigil;

impl Vigil {
    /// Create a new monitor builder.
    pub fn builder() -> VigilBuilder {
        VigilBuilder::new()
    }

    /// Build an initialised monitor with default configuration.
    pub fn monitor(host: SharedHost) -> Result<Monitor> {
        VigilBuilder::new().build(host)
    }
}

/// Builder for configuring a monitor.
pub struct VigilBuilder {
    config: MonitorConfig,
    sink: Option<Arc<dyn AnalyticsSink>>,
    sampler: Option<Arc<dyn Sampler>>,
    event_subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl VigilBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
            sink: None,
            sampler: None,
            event_subscribers: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set sampling and feature switches.
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.config.sampling = sampling;
        self
    }

    /// Set the sample rate, clamped into `[0, 1]`.
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.config.sampling = self.config.sampling.with_sample_rate(rate);
        self
    }

    /// Set the rating thresholds.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// Register the analytics sink.
    pub fn with_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the random sampler.
    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Add an event subscriber.
    pub fn with_event_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.event_subscribers.push(subscriber);
        self
    }

    /// Build and initialise a monitor over a host.
    pub fn build(self, host: SharedHost) -> Result<Monitor> {
        self.assemble(ObserverBridge::new(host))
    }

    /// Build a monitor with no host behind it. It is always inert.
    pub fn build_detached(self) -> Result<Monitor> {
        self.assemble(ObserverBridge::detached())
    }

    fn assemble(self, bridge: ObserverBridge) -> Result<Monitor> {
        self.config.validate()?;

        let events = EventDispatcher::new();
        for subscriber in self.event_subscribers {
            events.subscribe(subscriber);
        }

        let monitor = Monitor::assemble(
            bridge,
            self.config,
            self.sink,
            self.sampler,
            Arc::new(events),
        );
        monitor.init();
        Ok(monitor)
    }
}

impl Default for VigilBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{Monitor, Vigil, VigilBuilder, VigilError};

    // Core types
    pub use vigil_core::{
        classify, EntryType, LayoutShiftEntry, MetricName, MonitorConfig, PerformanceEntry,
        Rating, SamplingConfig, Threshold, Thresholds,
    };

    // Host types
    pub use vigil_host::{HostCapabilities, HostCapability, SimulatedHost};

    // Observability types
    pub use vigil_observe::{
        AnalyticsSink, ErrorReport, EventDispatcher, EventSubscriber, LoggingSubscriber,
        MonitorState, RecordingSink, TelemetryEvent, TelemetrySnapshot, WebVitals,
    };

    // Common std types
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;

    use vigil_core::{ConfigError, LayoutShiftEntry, MetricName, PerformanceEntry, Threshold};
    use vigil_host::SimulatedHost;
    use vigil_observe::{
        CollectingSubscriber, FixedSampler, MonitorState, RecordingSink, SequenceSampler,
    };

    fn shift(value: f64) -> PerformanceEntry {
        PerformanceEntry::LayoutShift(LayoutShiftEntry::new(value, false))
    }

    #[test]
    fn test_vigil_builder() {
        let host = SimulatedHost::new();
        let sink = Arc::new(RecordingSink::new());
        let monitor = Vigil::builder()
            .with_sample_rate(1.0)
            .with_sink(Arc::clone(&sink) as Arc<dyn AnalyticsSink>)
            .build(host.shared())
            .unwrap();

        assert_eq!(monitor.state(), MonitorState::Active);
        host.deliver(vec![shift(0.05)]);
        assert_eq!(monitor.get_metrics().cls, Some(0.05));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let thresholds =
            Thresholds::default().with(MetricName::Lcp, Threshold::new(4000.0, 2500.0));
        let result = Vigil::builder()
            .with_thresholds(thresholds)
            .build(SimulatedHost::new().shared());

        assert!(matches!(
            result,
            Err(VigilError::Config(ConfigError::InvalidThreshold { .. }))
        ));
    }

    #[test]
    fn test_custom_thresholds_drive_ratings() {
        let host = SimulatedHost::new();
        let sink = Arc::new(RecordingSink::new());
        let strict = Thresholds::default().with(MetricName::Cls, Threshold::new(0.01, 0.02));
        let monitor = Vigil::builder()
            .with_thresholds(strict)
            .with_sink(Arc::clone(&sink) as Arc<dyn AnalyticsSink>)
            .build(host.shared())
            .unwrap();

        host.deliver(vec![shift(0.05)]);
        monitor.flush();
        assert_eq!(sink.calls_for("cls")[0].payload["metric_rating"], "poor");
    }

    #[test]
    fn test_sampler_controls_forwarding() {
        let host = SimulatedHost::new();
        let sink = Arc::new(RecordingSink::new());
        let _monitor = Vigil::builder()
            .with_sample_rate(0.5)
            .with_sampler(Arc::new(SequenceSampler::new(vec![0.9, 0.1])))
            .with_sink(Arc::clone(&sink) as Arc<dyn AnalyticsSink>)
            .build(host.shared())
            .unwrap();

        host.deliver(vec![shift(0.01)]);
        host.deliver(vec![shift(0.01)]);
        assert_eq!(sink.calls_for("cls").len(), 1);
        assert_eq!(sink.calls_for("cls")[0].payload["value"], 20);

        let quiet = Arc::new(RecordingSink::new());
        let _monitor = Vigil::builder()
            .with_sample_rate(0.5)
            .with_sampler(Arc::new(FixedSampler(0.75)))
            .with_sink(Arc::clone(&quiet) as Arc<dyn AnalyticsSink>)
            .build(host.shared())
            .unwrap();
        host.deliver(vec![shift(0.01)]);
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_event_subscribers_see_lifecycle() {
        let collector = Arc::new(CollectingSubscriber::new(100));
        let monitor = Vigil::builder()
            .with_event_subscriber(Arc::clone(&collector) as Arc<dyn EventSubscriber>)
            .build(SimulatedHost::new().shared())
            .unwrap();
        monitor.dispose();

        let kinds = collector.kinds();
        assert!(kinds.contains(&"observer_registered"));
        assert_eq!(kinds.iter().filter(|k| **k == "monitor_started").count(), 1);
        assert_eq!(kinds.last(), Some(&"monitor_disposed"));
    }

    #[test]
    fn test_build_detached() {
        let monitor = Vigil::builder().build_detached().unwrap();
        assert_eq!(monitor.state(), MonitorState::Inert);
        assert!(monitor.get_metrics().is_empty());
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let host = SimulatedHost::new();
        let monitor = Vigil::monitor(host.shared()).unwrap();
        assert!(monitor.is_active());
    }
}

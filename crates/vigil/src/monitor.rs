//! The monitor: lifecycle and public surface of the telemetry core.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use vigil_core::{EntryType, MonitorConfig, NavigationBreakdown, PerformanceEntry};
use vigil_host::{
    shield, FaultKind, HeapUsage, Host, HostCapability, HostFault, ObserverBridge, ObserverHandle,
    SharedHost,
};
use vigil_observe::{
    AnalyticsSink, ErrorReport, EventDispatcher, MonitorState, Reporter, Sampler, SessionId,
    Signal, TelemetryEvent, TelemetryPipeline, TelemetrySnapshot, WebVitals,
    OBSERVED_ENTRY_TYPES,
};

/// Web Vitals and error telemetry for one page lifetime.
///
/// A monitor starts [`MonitorState::Uninitialized`]. [`Monitor::init`] runs
/// the capability check once and settles on `Active` or `Inert`. Every
/// operation is safe in every state; on an inert monitor they return empty
/// results.
pub struct Monitor {
    session_id: SessionId,
    config: MonitorConfig,
    bridge: ObserverBridge,
    events: Arc<EventDispatcher>,
    pipeline: Arc<TelemetryPipeline>,
    state: RwLock<MonitorState>,
    lifecycle: Mutex<Vec<ObserverHandle>>,
}

impl Monitor {
    /// Create a monitor over a host, with no sink.
    pub fn new(host: SharedHost, config: MonitorConfig) -> Self {
        Self::assemble(
            ObserverBridge::new(host),
            config,
            None,
            None,
            Arc::new(EventDispatcher::new()),
        )
    }

    /// Create a monitor with no host runtime at all.
    pub fn detached(config: MonitorConfig) -> Self {
        Self::assemble(
            ObserverBridge::detached(),
            config,
            None,
            None,
            Arc::new(EventDispatcher::new()),
        )
    }

    pub(crate) fn assemble(
        bridge: ObserverBridge,
        config: MonitorConfig,
        sink: Option<Arc<dyn AnalyticsSink>>,
        sampler: Option<Arc<dyn Sampler>>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        let mut reporter = Reporter::new(&config).with_events(Arc::clone(&events));
        if let Some(sink) = sink {
            reporter = reporter.with_sink(sink);
        }
        if let Some(sampler) = sampler {
            reporter = reporter.with_sampler(sampler);
        }
        let pipeline = TelemetryPipeline::new(&config, Arc::new(reporter), Arc::clone(&events));

        Self {
            session_id: SessionId::new(),
            config,
            bridge,
            events,
            pipeline: Arc::new(pipeline),
            state: RwLock::new(MonitorState::Uninitialized),
            lifecycle: Mutex::new(Vec::new()),
        }
    }

    /// Run the capability check and wire observers.
    ///
    /// Only the first call does any work; later calls return the current
    /// state.
    pub fn init(&self) -> MonitorState {
        let mut handles = self.lifecycle.lock();
        let current = self.state();
        if current != MonitorState::Uninitialized {
            return current;
        }

        let active = self.bridge.host().is_some() && self.bridge.capabilities().can_notify();
        if !active {
            debug!(session = %self.session_id, "Host cannot notify, monitor stays inert");
            *self.state.write() = MonitorState::Inert;
            self.events.emit(TelemetryEvent::MonitorStarted { active: false });
            return MonitorState::Inert;
        }

        for capability in HostCapability::ALL {
            if capability == HostCapability::MemoryInfo
                && !self.config.sampling.enable_memory_monitoring
            {
                continue;
            }
            if !self.bridge.supports(capability) {
                debug!(capability = capability.as_str(), "Feature disabled");
                self.events
                    .emit(TelemetryEvent::CapabilityUnavailable { capability });
            }
        }

        for entry_type in self.observed_entry_types() {
            let handle = self.observe(entry_type);
            self.track(&mut handles, handle);
        }
        for kind in [FaultKind::UncaughtException, FaultKind::UnhandledRejection] {
            let handle = self.listen(kind);
            self.track(&mut handles, handle);
        }

        let navigation = self.bridge.query(EntryType::Navigation);
        if !navigation.is_empty() {
            self.pipeline.submit(Signal::Batch {
                entry_type: EntryType::Navigation,
                entries: navigation,
            });
        }

        *self.state.write() = MonitorState::Active;
        info!(
            session = %self.session_id,
            observers = handles.len(),
            sample_rate = self.config.sampling.sample_rate,
            "Monitor active"
        );
        self.events.emit(TelemetryEvent::MonitorStarted { active: true });
        MonitorState::Active
    }

    fn observed_entry_types(&self) -> Vec<EntryType> {
        let mut types = OBSERVED_ENTRY_TYPES.to_vec();
        types.push(EntryType::Resource);
        if self.config.sampling.enable_long_task_detection {
            types.push(EntryType::LongTask);
        }
        types
    }

    fn observe(&self, entry_type: EntryType) -> ObserverHandle {
        let pipeline: Weak<TelemetryPipeline> = Arc::downgrade(&self.pipeline);
        self.bridge.observe(&[entry_type], move |entries| {
            if let Some(pipeline) = pipeline.upgrade() {
                pipeline.submit(Signal::Batch {
                    entry_type,
                    entries,
                });
            }
        })
    }

    fn listen(&self, kind: FaultKind) -> ObserverHandle {
        let Some(host) = self.bridge.host() else {
            return ObserverHandle::noop(kind.as_str());
        };
        let host: Weak<dyn Host> = Arc::downgrade(host);
        let pipeline: Weak<TelemetryPipeline> = Arc::downgrade(&self.pipeline);

        self.bridge.listen(kind, move |fault: HostFault| {
            let (Some(host), Some(pipeline)) = (host.upgrade(), pipeline.upgrade()) else {
                return;
            };
            let report = ErrorReport::from_fault(host.as_ref(), fault);
            pipeline.submit(Signal::Error(report));
        })
    }

    fn track(&self, handles: &mut Vec<ObserverHandle>, handle: ObserverHandle) {
        if handle.is_active() {
            self.events.emit(TelemetryEvent::ObserverRegistered {
                label: handle.label().to_string(),
            });
            handles.push(handle);
        }
    }

    /// Release every host registration.
    ///
    /// Metrics and errors stay readable. A delivery already in flight may
    /// still land.
    pub fn dispose(&self) {
        let mut handles = self.lifecycle.lock();
        if self.state() == MonitorState::Disposed {
            return;
        }

        let count = handles.len();
        for handle in handles.iter_mut() {
            handle.disconnect();
        }
        handles.clear();
        self.pipeline.drain();

        *self.state.write() = MonitorState::Disposed;
        info!(session = %self.session_id, handles = count, "Monitor disposed");
        self.events.emit(TelemetryEvent::MonitorDisposed { handles: count });
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        *self.state.read()
    }

    /// Whether observers and listeners are live.
    pub fn is_active(&self) -> bool {
        self.state() == MonitorState::Active
    }

    /// Session identifier.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Configuration the monitor was built with.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// The event dispatcher.
    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// Apply every queued signal. Returns the number applied.
    pub fn flush(&self) -> usize {
        self.pipeline.drain()
    }

    /// Copy of the current metric map.
    ///
    /// Includes every signal delivered before the call, unless a drain is
    /// running concurrently on another thread. Then the copy reflects
    /// what that drain has published so far.
    pub fn get_metrics(&self) -> WebVitals {
        self.pipeline.metrics()
    }

    /// Copy of the error history, oldest first.
    pub fn get_errors(&self) -> Vec<ErrorReport> {
        self.pipeline.errors()
    }

    /// Empty the error history. Metrics are untouched.
    pub fn clear_errors(&self) {
        self.pipeline.submit(Signal::ClearErrors);
    }

    /// Append an error report to the history.
    ///
    /// Ignored unless the monitor is active.
    pub fn log_error(&self, report: ErrorReport) {
        if !self.is_active() {
            debug!(message = %report.message, "Ignoring error on inactive monitor");
            return;
        }
        self.pipeline.submit(Signal::Error(report));
    }

    /// Build a report stamped with the host's clock, user agent and
    /// location.
    pub fn error_report(&self, message: impl Into<String>) -> ErrorReport {
        match self.bridge.host() {
            Some(host) => ErrorReport::from_host(host.as_ref(), message),
            None => ErrorReport::new(message, 0, "", ""),
        }
    }

    /// Best-effort heap usage snapshot.
    ///
    /// `None` unless memory monitoring is enabled, the monitor is active and
    /// the host exposes heap usage.
    pub fn measure_memory(&self) -> Option<HeapUsage> {
        if !self.is_active()
            || !self.config.sampling.enable_memory_monitoring
            || !self.bridge.supports(HostCapability::MemoryInfo)
        {
            return None;
        }
        let host = self.bridge.host()?;
        let heap = shield("heap_usage", || Ok(host.heap_usage())).ok().flatten()?;

        self.events.emit(TelemetryEvent::MemorySampled {
            used_bytes: heap.used_bytes,
            usage_percent: heap.usage_percent(),
        });
        Some(heap)
    }

    /// Best-effort read of the navigation phase timings. Nothing is stored.
    pub fn measure_navigation_timing(&self) -> Option<NavigationBreakdown> {
        if !self.is_active() {
            return None;
        }
        let breakdown = self
            .bridge
            .query(EntryType::Navigation)
            .into_iter()
            .find_map(|entry| match entry {
                PerformanceEntry::Navigation(nav) => Some(nav.breakdown()),
                _ => None,
            })?;

        self.events.emit(TelemetryEvent::NavigationMeasured {
            ttfb: breakdown.ttfb,
            load_complete: breakdown.load_complete,
        });
        Some(breakdown)
    }

    /// Everything the monitor knows right now.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let metrics = self.get_metrics();
        TelemetrySnapshot {
            session_id: self.session_id,
            state: self.state(),
            metrics,
            ratings: metrics.ratings(&self.config.thresholds),
            errors: self.get_errors(),
            memory: self.measure_memory(),
            navigation: self.measure_navigation_timing(),
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        for handle in self.lifecycle.get_mut().iter_mut() {
            handle.disconnect();
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .field("bridge", &self.bridge)
            .finish()
    }
}

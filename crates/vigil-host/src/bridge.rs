//! The observer bridge.
//!
//! Wraps the host's observation and notification primitives behind calls
//! that cannot fail. When the host lacks a capability, or refuses or panics
//! during registration, the caller gets an inert [`ObserverHandle`] whose
//! `disconnect` does nothing. Callers never branch on host support.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use vigil_core::{EntryType, PerformanceEntry};

use crate::capability::{HostCapabilities, HostCapability};
use crate::host::{shield, FaultCallback, FaultKind, HostFault, Registration, SharedHost};

/// Handle for one observation or listener registration.
pub struct ObserverHandle {
    label: String,
    registration: Option<Box<dyn Registration>>,
}

impl ObserverHandle {
    /// A handle that was never registered.
    pub fn noop(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            registration: None,
        }
    }

    fn live(label: String, registration: Box<dyn Registration>) -> Self {
        Self {
            label,
            registration: Some(registration),
        }
    }

    /// What this handle observes.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the handle is still registered with the host.
    pub fn is_active(&self) -> bool {
        self.registration.is_some()
    }

    /// Stop future deliveries. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if let Some(registration) = self.registration.take() {
            let result = shield("disconnect", || {
                registration.cancel();
                Ok(())
            });
            if let Err(e) = result {
                debug!(observer = %self.label, error = %e, "Disconnect failed");
            }
        }
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Bridges host capabilities into infallible registrations.
///
/// The host's capability set is read once, at construction. A host that
/// fails or panics while reporting it is treated as having none.
#[derive(Clone)]
pub struct ObserverBridge {
    host: Option<SharedHost>,
    capabilities: HostCapabilities,
}

impl ObserverBridge {
    /// Create a bridge over a host.
    pub fn new(host: SharedHost) -> Self {
        let capabilities =
            shield("capabilities", || Ok(host.capabilities())).unwrap_or_else(|e| {
                warn!(error = %e, "Capability check failed, host treated as unsupported");
                HostCapabilities::none()
            });
        Self {
            host: Some(host),
            capabilities,
        }
    }

    /// Create a bridge with no host behind it.
    pub fn detached() -> Self {
        Self {
            host: None,
            capabilities: HostCapabilities::none(),
        }
    }

    /// Capabilities of the host, as read at construction.
    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    /// The host, if any.
    pub fn host(&self) -> Option<&SharedHost> {
        self.host.as_ref()
    }

    /// Check if the host exposes a capability.
    pub fn supports(&self, capability: HostCapability) -> bool {
        self.capabilities.has(capability)
    }

    /// Observe entries of the given types.
    ///
    /// `on_batch` is invoked by the host, on the host's schedule, once per
    /// delivered batch.
    pub fn observe<F>(&self, entry_types: &[EntryType], on_batch: F) -> ObserverHandle
    where
        F: Fn(Vec<PerformanceEntry>) + Send + Sync + 'static,
    {
        let label = entry_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let Some(host) = self.host.as_ref() else {
            return ObserverHandle::noop(label);
        };
        if !self.supports(HostCapability::PerformanceObserver) {
            debug!(entry_types = %label, "Performance observation unavailable");
            return ObserverHandle::noop(label);
        }

        let callback: Arc<dyn Fn(Vec<PerformanceEntry>) + Send + Sync> = Arc::new(on_batch);
        match shield("observe", || host.observe(entry_types, callback)) {
            Ok(registration) => {
                debug!(entry_types = %label, "Observer registered");
                ObserverHandle::live(label, registration)
            }
            Err(e) => {
                warn!(entry_types = %label, error = %e, "Observer registration failed");
                ObserverHandle::noop(label)
            }
        }
    }

    /// Listen for global faults of one kind.
    pub fn listen<F>(&self, kind: FaultKind, on_fault: F) -> ObserverHandle
    where
        F: Fn(HostFault) + Send + Sync + 'static,
    {
        let label = kind.as_str().to_string();
        let capability = match kind {
            FaultKind::UncaughtException => HostCapability::ErrorEvents,
            FaultKind::UnhandledRejection => HostCapability::RejectionEvents,
        };

        let Some(host) = self.host.as_ref() else {
            return ObserverHandle::noop(label);
        };
        if !self.supports(capability) {
            debug!(fault = %label, "Fault notifications unavailable");
            return ObserverHandle::noop(label);
        }

        let callback: FaultCallback = Arc::new(on_fault);
        match shield("listen", || host.listen(kind, callback)) {
            Ok(registration) => ObserverHandle::live(label, registration),
            Err(e) => {
                warn!(fault = %label, error = %e, "Listener registration failed");
                ObserverHandle::noop(label)
            }
        }
    }

    /// Query entries already on the host timeline.
    ///
    /// Returns an empty list when the query is unsupported or fails.
    pub fn query(&self, entry_type: EntryType) -> Vec<PerformanceEntry> {
        let Some(host) = self.host.as_ref() else {
            return Vec::new();
        };
        if !self.supports(HostCapability::EntriesByType) {
            return Vec::new();
        }

        shield("entries_by_type", || host.entries_by_type(entry_type)).unwrap_or_else(|e| {
            debug!(entry_type = %entry_type, error = %e, "Timeline query failed");
            Vec::new()
        })
    }
}

impl fmt::Debug for ObserverBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverBridge")
            .field("attached", &self.host.is_some())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use vigil_core::{LayoutShiftEntry, NavigationTiming};

    use crate::capability::HostCapabilities;
    use crate::error::{HostError, HostResult};
    use crate::host::{BatchCallback, Host};
    use crate::simulated::SimulatedHost;

    fn layout_shift(value: f64) -> PerformanceEntry {
        PerformanceEntry::LayoutShift(LayoutShiftEntry::new(value, false))
    }

    #[test]
    fn test_observe_delivers_batches() {
        let host = SimulatedHost::new();
        let bridge = ObserverBridge::new(host.shared());
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let handle = bridge.observe(&[EntryType::LayoutShift], move |entries| {
            counter.fetch_add(entries.len(), Ordering::SeqCst);
        });

        assert!(handle.is_active());
        host.deliver(vec![layout_shift(0.1), layout_shift(0.2)]);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disconnect_stops_delivery() {
        let host = SimulatedHost::new();
        let bridge = ObserverBridge::new(host.shared());
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let mut handle = bridge.observe(&[EntryType::LayoutShift], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.disconnect();
        handle.disconnect();
        assert!(!handle.is_active());

        host.deliver(vec![layout_shift(0.1)]);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(host.observer_count(), 0);
    }

    #[test]
    fn test_unsupported_host_yields_noop_handle() {
        let host = SimulatedHost::unsupported();
        let bridge = ObserverBridge::new(host.shared());

        let mut handle = bridge.observe(&[EntryType::Paint], |_| {});
        assert!(!handle.is_active());
        handle.disconnect();

        let listener = bridge.listen(FaultKind::UncaughtException, |_| {});
        assert!(!listener.is_active());

        assert!(bridge.query(EntryType::Navigation).is_empty());
    }

    #[test]
    fn test_detached_bridge_is_inert() {
        let bridge = ObserverBridge::detached();
        assert!(!bridge.supports(HostCapability::PerformanceObserver));
        assert!(!bridge.observe(&[EntryType::Paint], |_| {}).is_active());
        assert!(bridge.query(EntryType::Navigation).is_empty());
    }

    #[test]
    fn test_failed_registration_is_swallowed() {
        let host = SimulatedHost::new().with_failing_registrations();
        let bridge = ObserverBridge::new(host.shared());

        let handle = bridge.observe(&[EntryType::FirstInput], |_| {});
        assert!(!handle.is_active());
        assert_eq!(host.observer_count(), 0);
    }

    struct PanickingHost;

    impl Host for PanickingHost {
        fn capabilities(&self) -> HostCapabilities {
            HostCapabilities::all()
        }

        fn observe(
            &self,
            _entry_types: &[EntryType],
            _callback: BatchCallback,
        ) -> HostResult<Box<dyn Registration>> {
            panic!("observer constructor threw")
        }

        fn entries_by_type(&self, _entry_type: EntryType) -> HostResult<Vec<PerformanceEntry>> {
            Err(HostError::Other("timeline unavailable".into()))
        }

        fn listen(
            &self,
            _kind: FaultKind,
            _callback: FaultCallback,
        ) -> HostResult<Box<dyn Registration>> {
            panic!("listener registration threw")
        }
    }

    #[test]
    fn test_panicking_host_is_contained() {
        let bridge = ObserverBridge::new(Arc::new(PanickingHost));

        assert!(!bridge.observe(&[EntryType::Paint], |_| {}).is_active());
        assert!(!bridge.listen(FaultKind::UnhandledRejection, |_| {}).is_active());
        assert!(bridge.query(EntryType::Navigation).is_empty());
    }

    struct BrokenCapabilityHost {
        calls: AtomicUsize,
    }

    impl Host for BrokenCapabilityHost {
        fn capabilities(&self) -> HostCapabilities {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("capability check threw")
        }

        fn observe(
            &self,
            _entry_types: &[EntryType],
            _callback: BatchCallback,
        ) -> HostResult<Box<dyn Registration>> {
            Err(HostError::Other("unreachable".into()))
        }

        fn entries_by_type(&self, _entry_type: EntryType) -> HostResult<Vec<PerformanceEntry>> {
            Ok(Vec::new())
        }

        fn listen(
            &self,
            _kind: FaultKind,
            _callback: FaultCallback,
        ) -> HostResult<Box<dyn Registration>> {
            Err(HostError::Other("unreachable".into()))
        }
    }

    #[test]
    fn test_panicking_capability_check_means_no_capabilities() {
        let host = Arc::new(BrokenCapabilityHost {
            calls: AtomicUsize::new(0),
        });
        let bridge = ObserverBridge::new(Arc::clone(&host) as SharedHost);

        assert!(bridge.capabilities().is_empty());
        assert!(!bridge.supports(HostCapability::ErrorEvents));
        assert!(!bridge.observe(&[EntryType::Paint], |_| {}).is_active());
        assert!(!bridge.listen(FaultKind::UncaughtException, |_| {}).is_active());
        assert!(bridge.query(EntryType::Navigation).is_empty());
        let _ = format!("{:?}", bridge);
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_returns_timeline_entries() {
        let host = SimulatedHost::new();
        host.record(PerformanceEntry::Navigation(NavigationTiming {
            request_start: 10.0,
            response_start: 60.0,
            ..Default::default()
        }));
        let bridge = ObserverBridge::new(host.shared());

        let entries = bridge.query(EntryType::Navigation);
        assert_eq!(entries.len(), 1);
        assert!(bridge.query(EntryType::Paint).is_empty());
    }
}

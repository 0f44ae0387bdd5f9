//! An in-process host.
//!
//! `SimulatedHost` implements [`Host`] without a browser: entries and
//! faults are pushed in by the caller and delivered synchronously to every
//! matching registration. It backs the test suites and the trace replayer.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

use vigil_core::{EntryType, PerformanceEntry};

use crate::capability::{HostCapabilities, HostCapability};
use crate::error::{HostError, HostResult};
use crate::host::{
    system_time_millis, BatchCallback, FaultCallback, FaultKind, HeapUsage, Host, HostFault,
    Registration, SharedHost,
};

struct ObserverSlot {
    id: u64,
    entry_types: Vec<EntryType>,
    callback: BatchCallback,
}

struct ListenerSlot {
    id: u64,
    kind: FaultKind,
    callback: FaultCallback,
}

struct SimConfig {
    capabilities: HostCapabilities,
    user_agent: String,
    location: String,
    fixed_time: Option<i64>,
    fail_registrations: bool,
}

struct SimState {
    config: RwLock<SimConfig>,
    next_id: AtomicU64,
    observers: RwLock<Vec<ObserverSlot>>,
    listeners: RwLock<Vec<ListenerSlot>>,
    timeline: RwLock<Vec<PerformanceEntry>>,
    heap: RwLock<Option<HeapUsage>>,
}

/// A host driven by the caller.
///
/// # Example
///
/// ```
/// use vigil_core::{LayoutShiftEntry, PerformanceEntry};
/// use vigil_host::SimulatedHost;
///
/// let host = SimulatedHost::new().with_location("https://example.com/");
/// let delivered = host.deliver(vec![PerformanceEntry::LayoutShift(
///     LayoutShiftEntry::new(0.05, false),
/// )]);
/// assert_eq!(delivered, 0); // nobody is observing yet
/// ```
#[derive(Clone)]
pub struct SimulatedHost {
    state: Arc<SimState>,
}

impl SimulatedHost {
    /// Create a host with every capability.
    pub fn new() -> Self {
        Self::with_capabilities(HostCapabilities::all())
    }

    /// Create a host with no capabilities at all.
    pub fn unsupported() -> Self {
        Self::with_capabilities(HostCapabilities::none())
    }

    /// Create a host with the given capabilities.
    pub fn with_capabilities(capabilities: HostCapabilities) -> Self {
        Self {
            state: Arc::new(SimState {
                config: RwLock::new(SimConfig {
                    capabilities,
                    user_agent: "vigil-simulated/1.0".to_string(),
                    location: "about:blank".to_string(),
                    fixed_time: None,
                    fail_registrations: false,
                }),
                next_id: AtomicU64::new(1),
                observers: RwLock::new(Vec::new()),
                listeners: RwLock::new(Vec::new()),
                timeline: RwLock::new(Vec::new()),
                heap: RwLock::new(None),
            }),
        }
    }

    /// Set the user agent string.
    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        self.state.config.write().user_agent = user_agent.into();
        self
    }

    /// Set the document location.
    pub fn with_location(self, location: impl Into<String>) -> Self {
        self.state.config.write().location = location.into();
        self
    }

    /// Freeze the wall clock at the given epoch milliseconds.
    pub fn with_fixed_time(self, millis: i64) -> Self {
        self.state.config.write().fixed_time = Some(millis);
        self
    }

    /// Report a heap usage snapshot.
    pub fn with_heap_usage(self, heap: HeapUsage) -> Self {
        *self.state.heap.write() = Some(heap);
        self
    }

    /// Reject every registration attempt.
    pub fn with_failing_registrations(self) -> Self {
        self.state.config.write().fail_registrations = true;
        self
    }

    /// Share this host as a trait object.
    pub fn shared(&self) -> SharedHost {
        Arc::new(self.clone())
    }

    /// Add an entry to the timeline without notifying observers.
    pub fn record(&self, entry: PerformanceEntry) {
        self.state.timeline.write().push(entry);
    }

    /// Update the heap usage snapshot.
    pub fn set_heap_usage(&self, heap: Option<HeapUsage>) {
        *self.state.heap.write() = heap;
    }

    /// Record entries on the timeline and deliver them to observers.
    ///
    /// Entries are grouped by category, in order of first appearance, and
    /// each group is delivered as one batch to every observer of that
    /// category. Returns the number of callback invocations.
    pub fn deliver(&self, entries: Vec<PerformanceEntry>) -> usize {
        let mut order: Vec<EntryType> = Vec::new();
        let mut groups: BTreeMap<EntryType, Vec<PerformanceEntry>> = BTreeMap::new();
        for entry in entries {
            let entry_type = entry.entry_type();
            if !groups.contains_key(&entry_type) {
                order.push(entry_type);
            }
            groups.entry(entry_type).or_default().push(entry);
        }

        let mut invocations = 0;
        for entry_type in order {
            let Some(batch) = groups.remove(&entry_type) else {
                continue;
            };
            self.state.timeline.write().extend(batch.iter().cloned());

            // Callbacks run outside the lock so they may register or cancel.
            let callbacks: Vec<BatchCallback> = self
                .state
                .observers
                .read()
                .iter()
                .filter(|slot| slot.entry_types.contains(&entry_type))
                .map(|slot| Arc::clone(&slot.callback))
                .collect();

            trace!(entry_type = %entry_type, observers = callbacks.len(), "Delivering batch");
            for callback in callbacks {
                callback(batch.clone());
                invocations += 1;
            }
        }
        invocations
    }

    /// Raise a fault to every listener of its kind.
    pub fn raise(&self, fault: HostFault) -> usize {
        let kind = fault.kind();
        let callbacks: Vec<FaultCallback> = self
            .state
            .listeners
            .read()
            .iter()
            .filter(|slot| slot.kind == kind)
            .map(|slot| Arc::clone(&slot.callback))
            .collect();

        for callback in &callbacks {
            callback(fault.clone());
        }
        callbacks.len()
    }

    /// Raise an uncaught exception.
    pub fn throw(&self, message: impl Into<String>, stack: Option<String>) -> usize {
        self.raise(HostFault::UncaughtException {
            message: message.into(),
            stack,
        })
    }

    /// Raise an unhandled rejection.
    pub fn reject(&self, reason: impl Into<String>) -> usize {
        self.raise(HostFault::UnhandledRejection {
            reason: reason.into(),
        })
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.state.observers.read().len()
    }

    /// Number of live fault listeners.
    pub fn listener_count(&self) -> usize {
        self.state.listeners.read().len()
    }

    fn next_id(&self) -> u64 {
        self.state.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_registration(&self, capability: HostCapability, what: &str) -> HostResult<()> {
        let config = self.state.config.read();
        if !config.capabilities.has(capability) {
            return Err(HostError::Unsupported(capability));
        }
        if config.fail_registrations {
            return Err(HostError::RegistrationFailed {
                what: what.to_string(),
                reason: "registration rejected by host".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedHost")
            .field("capabilities", &self.state.config.read().capabilities)
            .field("observers", &self.observer_count())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Host for SimulatedHost {
    fn capabilities(&self) -> HostCapabilities {
        self.state.config.read().capabilities
    }

    fn observe(
        &self,
        entry_types: &[EntryType],
        callback: BatchCallback,
    ) -> HostResult<Box<dyn Registration>> {
        self.check_registration(HostCapability::PerformanceObserver, "performance observer")?;

        let id = self.next_id();
        self.state.observers.write().push(ObserverSlot {
            id,
            entry_types: entry_types.to_vec(),
            callback,
        });
        Ok(Box::new(SimRegistration {
            state: Arc::downgrade(&self.state),
            id,
        }))
    }

    fn entries_by_type(&self, entry_type: EntryType) -> HostResult<Vec<PerformanceEntry>> {
        if !self.capabilities().has(HostCapability::EntriesByType) {
            return Err(HostError::Unsupported(HostCapability::EntriesByType));
        }
        Ok(self
            .state
            .timeline
            .read()
            .iter()
            .filter(|entry| entry.entry_type() == entry_type)
            .cloned()
            .collect())
    }

    fn listen(
        &self,
        kind: FaultKind,
        callback: FaultCallback,
    ) -> HostResult<Box<dyn Registration>> {
        let capability = match kind {
            FaultKind::UncaughtException => HostCapability::ErrorEvents,
            FaultKind::UnhandledRejection => HostCapability::RejectionEvents,
        };
        self.check_registration(capability, kind.as_str())?;

        let id = self.next_id();
        self.state
            .listeners
            .write()
            .push(ListenerSlot { id, kind, callback });
        Ok(Box::new(SimRegistration {
            state: Arc::downgrade(&self.state),
            id,
        }))
    }

    fn heap_usage(&self) -> Option<HeapUsage> {
        if !self.capabilities().has(HostCapability::MemoryInfo) {
            return None;
        }
        *self.state.heap.read()
    }

    fn user_agent(&self) -> String {
        self.state.config.read().user_agent.clone()
    }

    fn location(&self) -> String {
        self.state.config.read().location.clone()
    }

    fn now_millis(&self) -> i64 {
        match self.state.config.read().fixed_time {
            Some(millis) => millis,
            None => system_time_millis(),
        }
    }
}

/// Registration handed out by [`SimulatedHost`]. Ids are unique across
/// observers and listeners, so cancelling removes from both lists.
struct SimRegistration {
    state: Weak<SimState>,
    id: u64,
}

impl Registration for SimRegistration {
    fn cancel(self: Box<Self>) {
        if let Some(state) = self.state.upgrade() {
            state.observers.write().retain(|slot| slot.id != self.id);
            state.listeners.write().retain(|slot| slot.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use vigil_core::{LayoutShiftEntry, PaintEntry};

    #[test]
    fn test_deliver_groups_by_entry_type() {
        let host = SimulatedHost::new();
        let paints = Arc::new(AtomicUsize::new(0));
        let shifts = Arc::new(AtomicUsize::new(0));

        let p = Arc::clone(&paints);
        let _paint = host
            .observe(
                &[EntryType::Paint],
                Arc::new(move |batch: Vec<PerformanceEntry>| {
                    p.fetch_add(batch.len(), Ordering::SeqCst);
                }),
            )
            .unwrap();
        let s = Arc::clone(&shifts);
        let _shift = host
            .observe(
                &[EntryType::LayoutShift],
                Arc::new(move |batch: Vec<PerformanceEntry>| {
                    s.fetch_add(batch.len(), Ordering::SeqCst);
                }),
            )
            .unwrap();

        let invocations = host.deliver(vec![
            PerformanceEntry::Paint(PaintEntry::new("first-paint", 500.0)),
            PerformanceEntry::LayoutShift(LayoutShiftEntry::new(0.1, false)),
            PerformanceEntry::Paint(PaintEntry::new("first-contentful-paint", 600.0)),
        ]);

        assert_eq!(invocations, 2);
        assert_eq!(paints.load(Ordering::SeqCst), 2);
        assert_eq!(shifts.load(Ordering::SeqCst), 1);
        assert_eq!(host.entries_by_type(EntryType::Paint).unwrap().len(), 2);
    }

    #[test]
    fn test_cancel_removes_listener() {
        let host = SimulatedHost::new();
        let registration = host
            .listen(FaultKind::UncaughtException, Arc::new(|_: HostFault| {}))
            .unwrap();
        assert_eq!(host.listener_count(), 1);
        assert_eq!(host.throw("boom", None), 1);

        registration.cancel();
        assert_eq!(host.listener_count(), 0);
        assert_eq!(host.throw("boom", None), 0);
    }

    #[test]
    fn test_unsupported_host_rejects_registration() {
        let host = SimulatedHost::unsupported();
        assert!(matches!(
            host.observe(&[EntryType::Paint], Arc::new(|_: Vec<PerformanceEntry>| {})),
            Err(HostError::Unsupported(HostCapability::PerformanceObserver))
        ));
        assert!(host.entries_by_type(EntryType::Navigation).is_err());
        assert!(host.heap_usage().is_none());
    }

    #[test]
    fn test_host_identity() {
        let host = SimulatedHost::new()
            .with_user_agent("Mozilla/5.0 (Test)")
            .with_location("https://example.com/pricing")
            .with_fixed_time(1_700_000_000_000);

        assert_eq!(host.user_agent(), "Mozilla/5.0 (Test)");
        assert_eq!(host.location(), "https://example.com/pricing");
        assert_eq!(host.now_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_unfrozen_clock_follows_system_time() {
        let host = SimulatedHost::new();
        let before = system_time_millis();
        let now = host.now_millis();
        assert!(now >= before);
        assert!(now <= system_time_millis());
    }

    #[test]
    fn test_heap_usage_requires_capability() {
        let heap = HeapUsage {
            used_bytes: 10,
            total_bytes: 20,
            limit_bytes: 100,
        };
        let host = SimulatedHost::new().with_heap_usage(heap);
        assert_eq!(host.heap_usage(), Some(heap));

        let limited = SimulatedHost::with_capabilities(
            HostCapabilities::all().without(HostCapability::MemoryInfo),
        )
        .with_heap_usage(heap);
        assert_eq!(limited.heap_usage(), None);
    }
}

//! Vigil Host
//!
//! This crate describes the host runtime that Vigil observes and hides its
//! differences behind one uniform surface.
//!
//! # Host Capabilities
//!
//! Every host primitive is optional:
//!
//! - performance-entry observation
//! - the one-shot "entries by type" timeline query
//! - uncaught-exception and unhandled-rejection notifications
//! - heap usage snapshots
//!
//! A [`Host`] reports what it supports through [`HostCapabilities`]. The
//! [`ObserverBridge`] consults that set and catches every failure at the
//! boundary, so callers always receive a usable [`ObserverHandle`].
//!
//! # Usage
//!
//! ```ignore
//! use vigil_core::EntryType;
//! use vigil_host::{ObserverBridge, SimulatedHost};
//!
//! let host = SimulatedHost::new();
//! let bridge = ObserverBridge::new(host.shared());
//!
//! let mut handle = bridge.observe(&[EntryType::LayoutShift], |entries| {
//!     println!("{} layout shifts", entries.len());
//! });
//!
//! // Later: stop further deliveries. A no-op on unsupported hosts.
//! handle.disconnect();
//! ```

pub mod bridge;
pub mod capability;
pub mod error;
pub mod host;
pub mod simulated;

// Re-export main types
pub use bridge::{ObserverBridge, ObserverHandle};
pub use capability::{HostCapabilities, HostCapability};
pub use error::{HostError, HostResult};
pub use host::{
    panic_message, shield, system_time_millis, BatchCallback, FaultCallback, FaultKind, HeapUsage,
    Host, HostFault, Registration, SharedHost,
};
pub use simulated::SimulatedHost;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bridge::{ObserverBridge, ObserverHandle};
    pub use crate::capability::{HostCapabilities, HostCapability};
    pub use crate::host::{FaultKind, HeapUsage, Host, HostFault};
    pub use crate::simulated::SimulatedHost;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let host = SimulatedHost::new();
        let bridge = ObserverBridge::new(host.shared());
        assert!(bridge.supports(HostCapability::PerformanceObserver));
    }
}

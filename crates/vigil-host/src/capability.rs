//! Host capabilities.
//!
//! Hosts differ in what they can do: some expose a performance observer but
//! no heap statistics, some expose nothing at all. A [`HostCapabilities`]
//! set describes what one host offers so callers can check once instead of
//! probing at every call site.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single optional primitive a host runtime may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostCapability {
    /// Asynchronous performance-entry observation.
    PerformanceObserver,
    /// One-shot "entries by type" timeline query.
    EntriesByType,
    /// Global uncaught-exception notifications.
    ErrorEvents,
    /// Global unhandled-rejection notifications.
    RejectionEvents,
    /// Heap usage snapshots.
    MemoryInfo,
}

impl HostCapability {
    /// Every capability.
    pub const ALL: [HostCapability; 5] = [
        HostCapability::PerformanceObserver,
        HostCapability::EntriesByType,
        HostCapability::ErrorEvents,
        HostCapability::RejectionEvents,
        HostCapability::MemoryInfo,
    ];

    /// Stable name used in logs and trace files.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostCapability::PerformanceObserver => "performance-observer",
            HostCapability::EntriesByType => "entries-by-type",
            HostCapability::ErrorEvents => "error-events",
            HostCapability::RejectionEvents => "rejection-events",
            HostCapability::MemoryInfo => "memory-info",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for HostCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of capabilities a host exposes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HostCapabilities {
    bits: u8,
}

impl HostCapabilities {
    /// A host with no capabilities.
    pub const fn none() -> Self {
        Self { bits: 0 }
    }

    /// A host with every capability.
    pub fn all() -> Self {
        HostCapability::ALL.into_iter().collect()
    }

    /// Add a capability.
    pub fn with(mut self, capability: HostCapability) -> Self {
        self.bits |= capability.bit();
        self
    }

    /// Remove a capability.
    pub fn without(mut self, capability: HostCapability) -> Self {
        self.bits &= !capability.bit();
        self
    }

    /// Check if a capability is present.
    pub fn has(&self, capability: HostCapability) -> bool {
        self.bits & capability.bit() != 0
    }

    /// Whether the host can emit any notification the monitor listens to.
    pub fn can_notify(&self) -> bool {
        self.has(HostCapability::PerformanceObserver)
            || self.has(HostCapability::ErrorEvents)
            || self.has(HostCapability::RejectionEvents)
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Get the number of capabilities in the set.
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterate over the capabilities in the set.
    pub fn iter(&self) -> impl Iterator<Item = HostCapability> + '_ {
        HostCapability::ALL.into_iter().filter(|c| self.has(*c))
    }
}

impl FromIterator<HostCapability> for HostCapabilities {
    fn from_iter<I: IntoIterator<Item = HostCapability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

impl fmt::Debug for HostCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for HostCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(|c| c.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}

impl Serialize for HostCapabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for HostCapabilities {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<HostCapability>::deserialize(deserializer)?;
        Ok(list.into_iter().collect())
    }
}

//! The host runtime interface.
//!
//! A [`Host`] is whatever runtime emits performance entries and error
//! notifications: a browser binding, an embedded webview, or the in-process
//! [`SimulatedHost`](crate::SimulatedHost). Every primitive is optional and
//! gated by [`HostCapabilities`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use vigil_core::{EntryType, PerformanceEntry};

use crate::capability::HostCapabilities;
use crate::error::{HostError, HostResult};

/// Callback receiving one batch of performance entries.
pub type BatchCallback = Arc<dyn Fn(Vec<PerformanceEntry>) + Send + Sync>;

/// Callback receiving one uncaught fault.
pub type FaultCallback = Arc<dyn Fn(HostFault) + Send + Sync>;

/// Kind of global fault notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    /// An exception nobody caught.
    UncaughtException,
    /// An async rejection nobody handled.
    UnhandledRejection,
}

impl FaultKind {
    /// Stable name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::UncaughtException => "uncaught-exception",
            FaultKind::UnhandledRejection => "unhandled-rejection",
        }
    }
}

/// A fault raised by application code running on the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HostFault {
    /// An uncaught exception.
    UncaughtException {
        /// Exception message.
        message: String,
        /// Stack trace, if the host captured one.
        #[serde(default)]
        stack: Option<String>,
    },
    /// An unhandled async rejection.
    UnhandledRejection {
        /// Stringified rejection reason.
        reason: String,
    },
}

impl HostFault {
    /// Kind of this fault.
    pub fn kind(&self) -> FaultKind {
        match self {
            HostFault::UncaughtException { .. } => FaultKind::UncaughtException,
            HostFault::UnhandledRejection { .. } => FaultKind::UnhandledRejection,
        }
    }
}

/// Heap usage reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapUsage {
    /// Bytes currently in use.
    pub used_bytes: u64,
    /// Bytes currently allocated.
    pub total_bytes: u64,
    /// Maximum heap size.
    pub limit_bytes: u64,
}

impl HeapUsage {
    /// Used bytes as a percentage of the limit.
    pub fn usage_percent(&self) -> f64 {
        if self.limit_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.limit_bytes as f64 * 100.0
    }

    /// Used heap in whole megabytes.
    pub fn used_mb(&self) -> u64 {
        (self.used_bytes as f64 / 1_048_576.0).round() as u64
    }
}

/// A live registration with the host.
///
/// Cancelling stops future deliveries. A delivery already in flight may
/// still complete.
pub trait Registration: Send {
    /// Cancel the registration.
    fn cancel(self: Box<Self>);
}

/// The host runtime.
pub trait Host: Send + Sync {
    /// What this host can do.
    fn capabilities(&self) -> HostCapabilities;

    /// Register for asynchronous delivery of entries of the given types.
    fn observe(
        &self,
        entry_types: &[EntryType],
        callback: BatchCallback,
    ) -> HostResult<Box<dyn Registration>>;

    /// Query the entries of one type already on the timeline.
    fn entries_by_type(&self, entry_type: EntryType) -> HostResult<Vec<PerformanceEntry>>;

    /// Register for global fault notifications of one kind.
    fn listen(&self, kind: FaultKind, callback: FaultCallback)
        -> HostResult<Box<dyn Registration>>;

    /// Heap usage, if the host exposes it.
    fn heap_usage(&self) -> Option<HeapUsage> {
        None
    }

    /// The host's user agent string.
    fn user_agent(&self) -> String {
        String::new()
    }

    /// The current document location.
    fn location(&self) -> String {
        String::new()
    }

    /// Wall-clock time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64 {
        system_time_millis()
    }
}

/// The system wall clock in milliseconds since the Unix epoch, zero if the
/// clock reads before the epoch.
pub fn system_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Shared host reference.
pub type SharedHost = Arc<dyn Host>;

/// Run a host call, turning a panic into [`HostError::Panicked`].
pub fn shield<T>(operation: &str, f: impl FnOnce() -> HostResult<T>) -> HostResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(HostError::Panicked {
            operation: operation.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

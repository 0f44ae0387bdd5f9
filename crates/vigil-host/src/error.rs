//! Error types for host interaction.

use thiserror::Error;

use crate::capability::HostCapability;

/// Errors raised at the host boundary.
///
/// These never escape the bridge or the monitor; they are logged and turned
/// into no-op handles or empty results.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host does not expose the capability.
    #[error("Capability unavailable: {0}")]
    Unsupported(HostCapability),

    /// The host rejected a registration.
    #[error("Failed to register {what}: {reason}")]
    RegistrationFailed {
        /// What was being registered.
        what: String,
        /// The reason for failure.
        reason: String,
    },

    /// The host panicked while servicing a call.
    #[error("Host panicked during {operation}: {message}")]
    Panicked {
        /// The operation being performed.
        operation: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// Generic host error.
    #[error("Host error: {0}")]
    Other(String),
}

/// Result type for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;

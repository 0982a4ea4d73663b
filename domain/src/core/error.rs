//! Domain error types

use thiserror::Error;

/// Errors surfaced by kernel futures and session operations.
///
/// Every variant is cheap to clone so a single outcome can be observed by
/// several waiters (the original caller, busy tracking, widget dispatch).
/// Each kind is distinguishable so the UI can tell "kernel died" from
/// "timed out" from "kernel rejected the request".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Transport-level connect or handshake failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// An operation exceeded its caller-specified deadline.
    ///
    /// The kernel-side work is not cancelled; it may still be in flight.
    #[error("Kernel did not respond to {operation} within {timeout_ms}ms")]
    KernelPromiseTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The pending request was torn down before a reply arrived
    /// (explicit disposal or kernel death).
    #[error("Disposed Future")]
    DisposedFuture,

    /// The operation is an acknowledged stub for this connection kind.
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// The session was shut down; no further operations may be issued.
    #[error("Session has been disposed")]
    SessionDisposed,

    /// The kernel connection is closed or the kernel died.
    #[error("Kernel connection is closed")]
    Disconnected,

    /// The kernel answered with an error or abort status.
    #[error("Kernel rejected {msg_type}: {message}")]
    Rejected { msg_type: String, message: String },

    /// A reply arrived that does not match the request.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Sending on the underlying transport failed.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl KernelError {
    /// Check if this error represents a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, KernelError::KernelPromiseTimeout { .. })
    }

    /// Check if this error represents a torn-down request
    pub fn is_disposed(&self) -> bool {
        matches!(self, KernelError::DisposedFuture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposed_future_display() {
        assert_eq!(KernelError::DisposedFuture.to_string(), "Disposed Future");
    }

    #[test]
    fn test_timeout_is_distinct_from_rejection() {
        let timeout = KernelError::KernelPromiseTimeout {
            operation: "interrupt",
            timeout_ms: 5000,
        };
        let rejected = KernelError::Rejected {
            msg_type: "interrupt_reply".to_string(),
            message: "boom".to_string(),
        };
        assert!(timeout.is_timeout());
        assert!(!rejected.is_timeout());
        assert!(!timeout.is_disposed());
        assert_eq!(
            timeout.to_string(),
            "Kernel did not respond to interrupt within 5000ms"
        );
    }
}

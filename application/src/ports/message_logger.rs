//! Port for structured message logging.
//!
//! Defines the [`MessageLogger`] trait for recording every protocol message
//! that crosses a kernel connection, in either direction.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures the raw message
//! transcript in a machine-readable format (JSONL).

use nbkernel_domain::JupyterMessage;

/// Which way a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by this client to the kernel.
    Outbound,
    /// Received from the kernel.
    Inbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }
}

/// Port for logging protocol messages to a structured log.
///
/// The `log` method is synchronous and non-fallible so it can be called from
/// the message processing path; logging failures are silently ignored.
pub trait MessageLogger: Send + Sync {
    /// Record a message.
    fn log(&self, direction: Direction, message: &JupyterMessage);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoMessageLogger;

impl MessageLogger for NoMessageLogger {
    fn log(&self, _direction: Direction, _message: &JupyterMessage) {}
}

//! Port for the byte-level link to a kernel.
//!
//! A transport owns sockets (ZeroMQ, a websocket, or an in-process loopback),
//! performs framing and signing, and hands decoded [`JupyterMessage`]s to
//! exactly one subscriber.

use async_trait::async_trait;
use nbkernel_domain::{ConnectionInfo, JupyterMessage, KernelError};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur on a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Transport already has a message handler")]
    AlreadySubscribed,

    #[error("Transport is closed")]
    Closed,

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Unsupported signature scheme: {0}")]
    UnsupportedSignatureScheme(String),
}

impl From<TransportError> for KernelError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::ConnectFailed(reason) => KernelError::Connection(reason),
            TransportError::UnsupportedSignatureScheme(scheme) => {
                KernelError::Connection(format!("unsupported signature scheme {}", scheme))
            }
            TransportError::Closed => KernelError::Disconnected,
            other => KernelError::Transport(other.to_string()),
        }
    }
}

/// A bidirectional message link to one kernel.
///
/// Inbound messages are delivered in arrival order. Sending is fire and
/// forget: `send` queues the message and returns once it is handed off.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the link. `session_id` identifies this client to the kernel.
    async fn connect(&self, info: &ConnectionInfo, session_id: &str) -> Result<(), TransportError>;

    /// Queue a message for delivery on its channel.
    fn send(&self, message: JupyterMessage) -> Result<(), TransportError>;

    /// Take the inbound message stream.
    ///
    /// Only one handler may be installed; a second call fails with
    /// [`TransportError::AlreadySubscribed`]. The stream ends when the
    /// transport is disposed or the peer goes away.
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<JupyterMessage>, TransportError>;

    /// Release sockets and end the inbound stream. Idempotent.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

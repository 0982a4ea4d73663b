//! In-process transport.
//!
//! Every message crossing a [`LoopbackTransport`] is framed and signed with
//! the connection's key and parsed back, so the codec runs exactly as it
//! would against a real kernel.

use crate::wire::{MessageSigner, WireCodec, WireError};
use async_trait::async_trait;
use bytes::Bytes;
use nbkernel_application::{Transport, TransportError};
use nbkernel_domain::{Channel, ConnectionInfo, JupyterMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
struct LoopbackState {
    codec: Option<WireCodec>,
    inbound_tx: Option<mpsc::UnboundedSender<JupyterMessage>>,
    inbound_rx: Option<mpsc::UnboundedReceiver<JupyterMessage>>,
    subscribed: bool,
    sent: Vec<JupyterMessage>,
    kernel_side: Vec<mpsc::UnboundedSender<JupyterMessage>>,
}

/// A transport whose far end is the embedding code.
///
/// Use [`outbound`](Self::outbound) to observe what the client sends and
/// [`inject`](Self::inject) to play the kernel.
#[derive(Default)]
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
    disposed: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stream of messages the client sends, after a codec round trip.
    pub fn outbound(&self) -> mpsc::UnboundedReceiver<JupyterMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.is_disposed() {
            self.lock().kernel_side.push(tx);
        }
        rx
    }

    /// Every message sent so far.
    pub fn sent(&self) -> Vec<JupyterMessage> {
        self.lock().sent.clone()
    }

    /// Deliver `message` to the client as if the kernel had sent it.
    pub fn inject(&self, message: JupyterMessage) -> Result<(), TransportError> {
        let channel = message.channel.unwrap_or(Channel::Shell);
        let frames = {
            let state = self.lock();
            let codec = state.codec.as_ref().ok_or(TransportError::NotConnected)?;
            codec.encode(&message, &[])?
        };
        self.inject_frames(&frames, channel)
            .map_err(TransportError::from)
    }

    /// Deliver raw frames; they must carry a valid signature.
    pub fn inject_frames(&self, frames: &[Bytes], channel: Channel) -> Result<(), WireError> {
        if self.is_disposed() {
            return Ok(());
        }
        let state = self.lock();
        let Some(codec) = state.codec.as_ref() else {
            return Ok(());
        };
        let message = codec.decode(frames, channel)?;
        if let Some(tx) = &state.inbound_tx {
            let _ = tx.send(message);
        }
        Ok(())
    }

    /// End the inbound stream as if the kernel went away.
    pub fn close_from_peer(&self) {
        let mut state = self.lock();
        state.inbound_tx = None;
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self, info: &ConnectionInfo, session_id: &str) -> Result<(), TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Closed);
        }
        let codec = WireCodec::new(MessageSigner::from_info(info)?);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.codec = Some(codec);
        state.inbound_tx = Some(tx);
        state.inbound_rx = Some(rx);
        state.subscribed = false;
        debug!("Loopback transport connected for session {}", session_id);
        Ok(())
    }

    fn send(&self, message: JupyterMessage) -> Result<(), TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Closed);
        }
        let channel = message.channel.unwrap_or(Channel::Shell);
        let mut state = self.lock();
        let codec = state.codec.as_ref().ok_or(TransportError::NotConnected)?;
        let frames = codec.encode(&message, &[])?;
        let echoed = codec.decode(&frames, channel)?;

        state.kernel_side.retain(|tx| tx.send(echoed.clone()).is_ok());
        state.sent.push(echoed);
        Ok(())
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<JupyterMessage>, TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Closed);
        }
        let mut state = self.lock();
        if state.subscribed {
            return Err(TransportError::AlreadySubscribed);
        }
        let rx = state.inbound_rx.take().ok_or(TransportError::NotConnected)?;
        state.subscribed = true;
        Ok(rx)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.lock();
        state.inbound_tx = None;
        state.inbound_rx = None;
        state.kernel_side.clear();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

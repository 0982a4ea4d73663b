//! ZeroMQ transport to a locally launched or already running kernel.
//!
//! Shell, control and stdin use DEALER sockets; iopub uses a SUB socket
//! subscribed to every topic. Each socket is owned by one task that both
//! writes queued outbound messages and reads inbound ones; all readers feed
//! a single inbound queue.

use crate::wire::{MessageSigner, WireCodec};
use async_trait::async_trait;
use bytes::Bytes;
use nbkernel_application::{Transport, TransportError};
use nbkernel_domain::{Channel, ConnectionInfo, JupyterMessage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

/// A freshly launched kernel may not be listening yet.
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Default)]
struct ZmqState {
    outbound: HashMap<Channel, mpsc::UnboundedSender<JupyterMessage>>,
    inbound: Option<mpsc::UnboundedReceiver<JupyterMessage>>,
    subscribed: bool,
    tasks: Vec<JoinHandle<()>>,
}

/// ZeroMQ transport. One instance serves one kernel connection.
#[derive(Default)]
pub struct ZmqTransport {
    state: Mutex<ZmqState>,
    disposed: AtomicBool,
    cancel: CancellationToken,
}

impl ZmqTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ZmqState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn to_zmq(frames: Vec<Bytes>) -> Option<ZmqMessage> {
    let mut frames = frames.into_iter();
    let mut message = ZmqMessage::from(frames.next()?);
    for frame in frames {
        message.push_back(frame);
    }
    Some(message)
}

fn deliver(
    codec: &WireCodec,
    channel: Channel,
    message: ZmqMessage,
    inbound: &mpsc::UnboundedSender<JupyterMessage>,
) -> bool {
    let frames = message.into_vec();
    match codec.decode(&frames, channel) {
        Ok(message) => {
            trace!("{} <- {}", channel, message.msg_type());
            inbound.send(message).is_ok()
        }
        Err(e) => {
            warn!("Dropping malformed {} message: {}", channel, e);
            true
        }
    }
}

async fn connect_with_retry<S: Socket + Send>(
    socket: &mut S,
    endpoint: &str,
) -> Result<(), TransportError> {
    let mut attempt = 1;
    loop {
        match socket.connect(endpoint).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                trace!("Connect to {} failed (attempt {}): {}", endpoint, attempt, e);
                attempt += 1;
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(TransportError::ConnectFailed(format!("{}: {}", endpoint, e)));
            }
        }
    }
}

async fn dealer_loop(
    mut socket: DealerSocket,
    channel: Channel,
    codec: Arc<WireCodec>,
    mut outbound: mpsc::UnboundedReceiver<JupyterMessage>,
    inbound: mpsc::UnboundedSender<JupyterMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            message = outbound.recv() => {
                let Some(message) = message else { break };
                let frames = match codec.encode(&message, &[]) {
                    Ok(frames) => frames,
                    Err(e) => {
                        warn!("Could not encode {}: {}", message.msg_type(), e);
                        continue;
                    }
                };
                let Some(frames) = to_zmq(frames) else { continue };
                trace!("{} -> {}", channel, message.msg_type());
                if let Err(e) = socket.send(frames).await {
                    warn!("{} socket send failed: {}", channel, e);
                    break;
                }
            }
            received = socket.recv() => match received {
                Ok(message) => {
                    if !deliver(&codec, channel, message, &inbound) {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{} socket closed: {}", channel, e);
                    break;
                }
            },
        }
    }
    debug!("{} socket task stopped", channel);
}

async fn subscriber_loop(
    mut socket: SubSocket,
    codec: Arc<WireCodec>,
    inbound: mpsc::UnboundedSender<JupyterMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv() => match received {
                Ok(message) => {
                    if !deliver(&codec, Channel::Iopub, message, &inbound) {
                        break;
                    }
                }
                Err(e) => {
                    warn!("iopub socket closed: {}", e);
                    break;
                }
            },
        }
    }
    debug!("iopub socket task stopped");
}

#[async_trait]
impl Transport for ZmqTransport {
    async fn connect(&self, info: &ConnectionInfo, session_id: &str) -> Result<(), TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Closed);
        }
        let codec = Arc::new(WireCodec::new(MessageSigner::from_info(info)?));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let mut outbound = HashMap::new();
        let mut tasks = Vec::new();

        for channel in [Channel::Shell, Channel::Control, Channel::Stdin] {
            let endpoint = info.channel_endpoint(channel);
            let mut socket = DealerSocket::new();
            connect_with_retry(&mut socket, &endpoint).await?;
            debug!("{} connected to {}", channel, endpoint);

            let (tx, rx) = mpsc::unbounded_channel();
            outbound.insert(channel, tx);
            tasks.push(tokio::spawn(dealer_loop(
                socket,
                channel,
                Arc::clone(&codec),
                rx,
                inbound_tx.clone(),
                self.cancel.clone(),
            )));
        }

        let endpoint = info.channel_endpoint(Channel::Iopub);
        let mut socket = SubSocket::new();
        connect_with_retry(&mut socket, &endpoint).await?;
        socket
            .subscribe("")
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("{}: {}", endpoint, e)))?;
        debug!("iopub connected to {}", endpoint);
        tasks.push(tokio::spawn(subscriber_loop(
            socket,
            codec,
            inbound_tx,
            self.cancel.clone(),
        )));

        let mut state = self.lock();
        for task in state.tasks.drain(..) {
            task.abort();
        }
        state.outbound = outbound;
        state.inbound = Some(inbound_rx);
        state.subscribed = false;
        state.tasks = tasks;
        debug!("ZeroMQ transport ready for session {}", session_id);
        Ok(())
    }

    fn send(&self, message: JupyterMessage) -> Result<(), TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Closed);
        }
        let channel = message.channel.unwrap_or(Channel::Shell);
        let state = self.lock();
        let tx = state
            .outbound
            .get(&channel)
            .ok_or(TransportError::NotConnected)?;
        tx.send(message).map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<JupyterMessage>, TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Closed);
        }
        let mut state = self.lock();
        if state.subscribed {
            return Err(TransportError::AlreadySubscribed);
        }
        let rx = state.inbound.take().ok_or(TransportError::NotConnected)?;
        state.subscribed = true;
        Ok(rx)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        let mut state = self.lock();
        state.outbound.clear();
        state.inbound = None;
        for task in state.tasks.drain(..) {
            task.abort();
        }
        debug!("ZeroMQ transport disposed");
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for ZmqTransport {
    fn drop(&mut self) {
        self.dispose();
    }
}

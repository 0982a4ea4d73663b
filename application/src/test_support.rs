//! Test doubles shared by the application layer's unit tests.

use crate::kernel::{RawKernelClient, RawKernelOptions};
use crate::ports::connection_factory::KernelConnectionFactory;
use crate::ports::kernel_connection::KernelConnection;
use crate::ports::message_builder::MessageBuilder;
use crate::ports::transport::{Transport, TransportError};
use async_trait::async_trait;
use nbkernel_domain::{
    Channel, ConnectionInfo, Header, JupyterMessage, KernelError, KernelSelection,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

fn next_id(prefix: &str) -> String {
    format!("{}-{}", prefix, NEXT_ID.fetch_add(1, Ordering::SeqCst))
}

fn channel_for(msg_type: &str) -> Channel {
    match msg_type {
        "interrupt_request" | "shutdown_request" => Channel::Control,
        "input_reply" => Channel::Stdin,
        _ => Channel::Shell,
    }
}

fn header(msg_type: &str) -> Header {
    Header::new(next_id("msg"), msg_type, "kernel-session", "kernel", "")
}

/// A client request with a unique id.
pub fn request(msg_type: &str, content: Value) -> JupyterMessage {
    JupyterMessage::new(header(msg_type), channel_for(msg_type), content)
}

/// The kernel's reply to `req`, on the request's channel.
pub fn reply_to(req: &JupyterMessage, msg_type: &str, content: Value) -> JupyterMessage {
    let channel = req.channel.unwrap_or(Channel::Shell);
    JupyterMessage::new(header(msg_type), channel, content).with_parent(&req.header)
}

/// An iopub message produced while handling `parent`.
pub fn iopub(parent: &JupyterMessage, msg_type: &str, content: Value) -> JupyterMessage {
    JupyterMessage::new(header(msg_type), Channel::Iopub, content).with_parent(&parent.header)
}

/// An iopub `status` message for `parent`.
pub fn status(parent: &JupyterMessage, state: &str) -> JupyterMessage {
    iopub(parent, "status", json!({"execution_state": state}))
}

/// An iopub `status` message not tied to any request.
pub fn kernel_status(state: &str) -> JupyterMessage {
    JupyterMessage::new(
        header("status"),
        Channel::Iopub,
        json!({"execution_state": state}),
    )
}

pub fn connection_info() -> ConnectionInfo {
    serde_json::from_value(json!({
        "transport": "tcp",
        "ip": "127.0.0.1",
        "shell_port": 50001,
        "iopub_port": 50002,
        "stdin_port": 50003,
        "hb_port": 50004,
        "control_port": 50005,
        "signature_scheme": "hmac-sha256",
        "key": ""
    }))
    .unwrap()
}

/// Deterministic builder: ids are `out-1`, `out-2`, ...
#[derive(Default)]
pub struct SequentialMessageBuilder {
    next: AtomicUsize,
}

impl MessageBuilder for SequentialMessageBuilder {
    fn build(
        &self,
        session: &str,
        channel: Channel,
        msg_type: &str,
        content: Value,
    ) -> JupyterMessage {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let header = Header::new(format!("out-{}", n), msg_type, session, "tester", "");
        JupyterMessage::new(header, channel, content)
    }
}

/// In-memory transport: records what is sent, lets tests inject inbound
/// messages.
pub struct FakeTransport {
    sent: Mutex<Vec<JupyterMessage>>,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<JupyterMessage>>>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<JupyterMessage>>>,
    fail_connect: Option<String>,
    fail_send: AtomicBool,
    disposed: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    pub fn refusing(reason: &str) -> Arc<Self> {
        Self::build(Some(reason.to_string()))
    }

    fn build(fail_connect: Option<String>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: Mutex::new(Some(rx)),
            fail_connect,
            fail_send: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// Deliver a message as if it came from the kernel.
    pub fn push(&self, message: JupyterMessage) {
        if let Some(tx) = self.inbound_tx.lock().unwrap().as_ref() {
            let _ = tx.send(message);
        }
    }

    /// Simulate the kernel side going away.
    pub fn close_from_peer(&self) {
        self.inbound_tx.lock().unwrap().take();
    }

    pub fn fail_sends(&self) {
        self.fail_send.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<JupyterMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of_type(&self, msg_type: &str) -> Vec<JupyterMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.msg_type() == msg_type)
            .collect()
    }

    pub fn last_sent(&self) -> JupyterMessage {
        self.sent().last().cloned().expect("nothing was sent")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(
        &self,
        _info: &ConnectionInfo,
        _session_id: &str,
    ) -> Result<(), TransportError> {
        match &self.fail_connect {
            Some(reason) => Err(TransportError::ConnectFailed(reason.clone())),
            None => Ok(()),
        }
    }

    fn send(&self, message: JupyterMessage) -> Result<(), TransportError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<JupyterMessage>, TransportError> {
        self.inbound_rx
            .lock()
            .unwrap()
            .take()
            .ok_or(TransportError::AlreadySubscribed)
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.inbound_tx.lock().unwrap().take();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Connect a raw client over a fresh fake transport.
pub async fn connected_client() -> (Arc<RawKernelClient>, Arc<FakeTransport>) {
    let transport = FakeTransport::new();
    let client = RawKernelClient::with_options(
        transport.clone(),
        Arc::new(SequentialMessageBuilder::default()),
        RawKernelOptions::default(),
    );
    client.connect(&connection_info()).await.unwrap();
    (Arc::new(client), transport)
}

/// Let spawned tasks drain their queues.
pub async fn flush() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Factory that hands out raw clients over fake transports.
#[derive(Default)]
pub struct FakeFactory {
    transports: Mutex<Vec<Arc<FakeTransport>>>,
    connects: AtomicUsize,
    refuse: AtomicBool,
}

impl FakeFactory {
    pub fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Transport of the `index`-th connection handed out.
    pub fn transport(&self, index: usize) -> Arc<FakeTransport> {
        self.transports.lock().unwrap()[index].clone()
    }

    pub fn latest_transport(&self) -> Arc<FakeTransport> {
        self.transports
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection was made")
    }

    async fn open(&self) -> Result<Arc<dyn KernelConnection>, KernelError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(KernelError::Connection("refused".to_string()));
        }
        let transport = FakeTransport::new();
        let client = RawKernelClient::with_options(
            transport.clone(),
            Arc::new(SequentialMessageBuilder::default()),
            RawKernelOptions::default(),
        );
        client.connect(&connection_info()).await?;
        self.transports.lock().unwrap().push(transport);
        Ok(Arc::new(client))
    }
}

#[async_trait]
impl KernelConnectionFactory for FakeFactory {
    async fn connect(
        &self,
        _selection: &KernelSelection,
    ) -> Result<Arc<dyn KernelConnection>, KernelError> {
        self.open().await
    }

    async fn restart(
        &self,
        current: Arc<dyn KernelConnection>,
        _selection: &KernelSelection,
    ) -> Result<Arc<dyn KernelConnection>, KernelError> {
        current.dispose();
        self.open().await
    }
}

pub fn selection() -> KernelSelection {
    KernelSelection::Running(connection_info())
}

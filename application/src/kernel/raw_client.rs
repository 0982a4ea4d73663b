//! Kernel client that talks to a kernel directly over a [`Transport`].
//!
//! [`RawKernelClient`] owns the routing table from request `msg_id` to
//! [`KernelFuture`]. A single background processor task drains the
//! transport's inbound stream and handles each message to completion before
//! taking the next, so per-request ordering and status transitions are
//! observed exactly in arrival order.
//!
//! ```text
//! transport ──► processor task ──┬─► status update ──► status_changed()
//!                                ├─► futures[parent.msg_id].handle_message()
//!                                ├─► iopub_messages()
//!                                └─► unhandled_messages()
//! ```

use super::future::{FutureOptions, KernelFuture};
use crate::events::EventEmitter;
use crate::ports::kernel_connection::{KernelConnection, OutgoingComm};
use crate::ports::message_builder::MessageBuilder;
use crate::ports::message_logger::{Direction, MessageLogger, NoMessageLogger};
use crate::ports::transport::Transport;
use async_trait::async_trait;
use nbkernel_domain::{
    Channel, CommClose, CommOpen, CompleteRequest, ConnectionInfo, ErrorContent, ExecuteRequest,
    Header, HistoryRequest, InputReply, InspectRequest, InterruptRequest, IsCompleteRequest,
    JupyterMessage, KernelError, KernelInfoRequest, KernelStatus, RequestContent,
    ShutdownRequest,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Optional settings for a [`RawKernelClient`].
pub struct RawKernelOptions {
    /// Kernel identity; a fresh UUID when absent.
    pub kernel_id: Option<String>,
    pub logger: Arc<dyn MessageLogger>,
}

impl Default for RawKernelOptions {
    fn default() -> Self {
        Self {
            kernel_id: None,
            logger: Arc::new(NoMessageLogger),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn closed_stream<T>() -> mpsc::UnboundedReceiver<T> {
    let (_, rx) = mpsc::unbounded_channel();
    rx
}

/// Turn an `error`/`abort` reply into [`KernelError::Rejected`].
fn check_reply(reply: JupyterMessage) -> Result<JupyterMessage, KernelError> {
    match reply.reply_status() {
        Some(status @ ("error" | "abort")) => {
            let message = match reply.content_as::<ErrorContent>() {
                Ok(err) if !err.ename.is_empty() => format!("{}: {}", err.ename, err.evalue),
                _ => status.to_string(),
            };
            Err(KernelError::Rejected {
                msg_type: reply.msg_type().to_string(),
                message,
            })
        }
        _ => Ok(reply),
    }
}

struct ClientShared {
    kernel_id: String,
    client_id: String,
    transport: Arc<dyn Transport>,
    builder: Arc<dyn MessageBuilder>,
    logger: Arc<dyn MessageLogger>,
    futures: Mutex<HashMap<String, KernelFuture>>,
    status: RwLock<KernelStatus>,
    disposed: AtomicBool,
    cancel: CancellationToken,
    status_events: EventEmitter<KernelStatus>,
    iopub_events: EventEmitter<JupyterMessage>,
    unhandled_events: EventEmitter<JupyterMessage>,
    comm_targets: Mutex<HashMap<String, EventEmitter<JupyterMessage>>>,
    last_input_request: Mutex<Option<Header>>,
}

impl ClientShared {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn status(&self) -> KernelStatus {
        self.status
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn build<C: RequestContent>(&self, content: &C) -> Result<JupyterMessage, KernelError> {
        let value = serde_json::to_value(content)
            .map_err(|e| KernelError::Transport(format!("failed to encode {}: {}", C::MSG_TYPE, e)))?;
        Ok(self
            .builder
            .build(&self.client_id, C::CHANNEL, C::MSG_TYPE, value))
    }

    /// Send a message that nobody waits on.
    fn send_untracked(&self, msg: JupyterMessage) -> Result<(), KernelError> {
        if self.is_disposed() {
            return Err(KernelError::Disconnected);
        }
        self.logger.log(Direction::Outbound, &msg);
        self.transport.send(msg)?;
        Ok(())
    }

    /// Register a future for `msg`, then send it.
    ///
    /// The future is in the routing table before the message leaves, so a
    /// reply can never beat its registration. If the send fails the entry is
    /// removed again.
    fn send_tracked(
        self: &Arc<Self>,
        msg: JupyterMessage,
        options: FutureOptions,
    ) -> Result<KernelFuture, KernelError> {
        if self.is_disposed() {
            return Err(KernelError::Disconnected);
        }

        let weak = Arc::downgrade(self);
        let future = KernelFuture::new(msg.clone(), options, move |msg_id| {
            if let Some(shared) = weak.upgrade() {
                lock(&shared.futures).remove(msg_id);
            }
        });
        lock(&self.futures).insert(msg.msg_id().to_string(), future.clone());

        trace!(
            "Kernel {}: sending {} ({})",
            self.kernel_id,
            msg.msg_type(),
            msg.msg_id()
        );
        self.logger.log(Direction::Outbound, &msg);
        if let Err(e) = self.transport.send(msg) {
            warn!("Kernel {}: send failed: {}", self.kernel_id, e);
            future.dispose();
            return Err(e.into());
        }
        Ok(future)
    }

    async fn request<C: RequestContent>(
        self: &Arc<Self>,
        content: &C,
    ) -> Result<JupyterMessage, KernelError> {
        let msg = self.build(content)?;
        let future = self.send_tracked(msg, FutureOptions::request())?;
        check_reply(future.done().await?)
    }

    fn set_status(&self, status: KernelStatus) {
        let changed = {
            let mut current = self.status.write().unwrap_or_else(|e| e.into_inner());
            if *current == status {
                false
            } else {
                *current = status.clone();
                true
            }
        };
        if changed {
            debug!("Kernel {} status: {}", self.kernel_id, status.as_str());
            self.status_events.fire(status.clone());
        }
        if status.is_dead() {
            self.dispose();
        }
    }

    fn handle_message(&self, msg: JupyterMessage) {
        self.logger.log(Direction::Inbound, &msg);
        if self.is_disposed() {
            trace!(
                "Kernel {}: dropping {} after dispose",
                self.kernel_id,
                msg.msg_type()
            );
            return;
        }

        let on_iopub = msg.channel == Some(Channel::Iopub);
        if on_iopub {
            if let Some(state) = msg.execution_state() {
                self.set_status(state);
                if self.is_disposed() {
                    return;
                }
            }
            if msg.msg_type() == "comm_open" {
                self.route_comm_open(&msg);
            }
        } else if msg.channel == Some(Channel::Stdin) && msg.msg_type() == "input_request" {
            *lock(&self.last_input_request) = Some(msg.header.clone());
        }

        let future = msg
            .parent_msg_id()
            .and_then(|id| lock(&self.futures).get(id).cloned());

        match future {
            Some(future) if on_iopub => future.handle_message(msg.clone()),
            Some(future) => {
                future.handle_message(msg);
                return;
            }
            None if on_iopub => {}
            None if !self.is_own(&msg) => {
                trace!(
                    "Kernel {}: dropping {} from session {}",
                    self.kernel_id,
                    msg.msg_type(),
                    msg.header.session
                );
                return;
            }
            None => {
                debug!(
                    "Kernel {}: unhandled {} (parent {:?})",
                    self.kernel_id,
                    msg.msg_type(),
                    msg.parent_msg_id()
                );
                self.unhandled_events.fire(msg);
                return;
            }
        }
        self.iopub_events.fire(msg);
    }

    /// Whether a message belongs to this client's session, either directly
    /// or as a response to one of its requests.
    fn is_own(&self, msg: &JupyterMessage) -> bool {
        msg.header.session == self.client_id
            || msg
                .parent_header
                .as_ref()
                .is_some_and(|parent| parent.session == self.client_id)
    }

    /// Deliver a kernel-initiated `comm_open` to its target, or close the
    /// comm when nobody listens for that target.
    fn route_comm_open(&self, msg: &JupyterMessage) {
        let open: CommOpen = match msg.content_as() {
            Ok(open) => open,
            Err(e) => {
                warn!("Kernel {}: malformed comm_open: {}", self.kernel_id, e);
                return;
            }
        };

        let delivered = {
            let mut targets = lock(&self.comm_targets);
            match targets.get(&open.target_name) {
                Some(listeners) => {
                    listeners.fire(msg.clone());
                    if listeners.subscriber_count() == 0 {
                        targets.remove(&open.target_name);
                        false
                    } else {
                        true
                    }
                }
                None => false,
            }
        };
        if delivered {
            return;
        }

        debug!(
            "Kernel {}: no comm target '{}', closing comm {}",
            self.kernel_id, open.target_name, open.comm_id
        );
        let close = CommClose {
            comm_id: open.comm_id,
            data: Value::Object(Map::new()),
        };
        let result = self
            .build(&close)
            .map(|m| m.with_parent(&msg.header))
            .and_then(|m| self.send_untracked(m));
        if let Err(e) = result {
            warn!("Kernel {}: failed to close comm: {}", self.kernel_id, e);
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Disposing kernel client {}", self.kernel_id);
        self.cancel.cancel();
        self.transport.dispose();

        let pending: Vec<KernelFuture> = lock(&self.futures).drain().map(|(_, f)| f).collect();
        if !pending.is_empty() {
            debug!(
                "Kernel {}: rejecting {} pending request(s)",
                self.kernel_id,
                pending.len()
            );
        }
        for future in pending {
            future.dispose();
        }

        lock(&self.comm_targets).clear();
        self.status_events.clear();
        self.iopub_events.clear();
        self.unhandled_events.clear();
    }
}

/// A [`KernelConnection`] that speaks the wire protocol itself.
///
/// Lifecycle operations that need a process manager (`restart`,
/// `reconnect`) are not available here; the connection factory restarts raw
/// kernels by launching a new process.
pub struct RawKernelClient {
    shared: Arc<ClientShared>,
    processor: Mutex<Option<JoinHandle<()>>>,
}

impl RawKernelClient {
    pub fn new(transport: Arc<dyn Transport>, builder: Arc<dyn MessageBuilder>) -> Self {
        Self::with_options(transport, builder, RawKernelOptions::default())
    }

    pub fn with_options(
        transport: Arc<dyn Transport>,
        builder: Arc<dyn MessageBuilder>,
        options: RawKernelOptions,
    ) -> Self {
        let kernel_id = options
            .kernel_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            shared: Arc::new(ClientShared {
                kernel_id,
                client_id: uuid::Uuid::new_v4().to_string(),
                transport,
                builder,
                logger: options.logger,
                futures: Mutex::new(HashMap::new()),
                status: RwLock::new(KernelStatus::Unknown),
                disposed: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                status_events: EventEmitter::new(),
                iopub_events: EventEmitter::new(),
                unhandled_events: EventEmitter::new(),
                comm_targets: Mutex::new(HashMap::new()),
                last_input_request: Mutex::new(None),
            }),
            processor: Mutex::new(None),
        }
    }

    /// Connect the transport and start processing inbound messages.
    ///
    /// Status stays `unknown` until the kernel reports one.
    pub async fn connect(&self, info: &ConnectionInfo) -> Result<(), KernelError> {
        let shared = Arc::clone(&self.shared);
        if shared.is_disposed() {
            return Err(KernelError::Disconnected);
        }

        info!(
            "Connecting to kernel {} at {}",
            shared.kernel_id,
            info.channel_endpoint(Channel::Shell)
        );
        shared.transport.connect(info, &shared.client_id).await?;
        let mut inbound = shared.transport.subscribe()?;

        let cancel = shared.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = inbound.recv() => match msg {
                        Some(msg) => msg,
                        None => {
                            if !shared.is_disposed() {
                                warn!("Kernel {}: transport closed", shared.kernel_id);
                                shared.set_status(KernelStatus::Dead);
                            }
                            break;
                        }
                    },
                };
                shared.handle_message(msg);
            }
            debug!("Kernel {}: message processor stopped", shared.kernel_id);
        });
        *lock(&self.processor) = Some(handle);
        Ok(())
    }

    /// Number of requests still registered for routing.
    pub fn pending_requests(&self) -> usize {
        lock(&self.shared.futures).len()
    }

    /// Messages on shell, control or stdin that matched no pending request.
    ///
    /// Only traffic of this client's session is reported; iopub is never
    /// filtered by session.
    pub fn unhandled_messages(&self) -> mpsc::UnboundedReceiver<JupyterMessage> {
        if self.shared.is_disposed() {
            return closed_stream();
        }
        self.shared.unhandled_events.subscribe()
    }

    pub async fn request_is_complete(
        &self,
        content: IsCompleteRequest,
    ) -> Result<JupyterMessage, KernelError> {
        self.shared.request(&content).await
    }
}

impl Drop for RawKernelClient {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

#[async_trait]
impl KernelConnection for RawKernelClient {
    fn id(&self) -> &str {
        &self.shared.kernel_id
    }

    fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    fn status(&self) -> KernelStatus {
        self.shared.status()
    }

    fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    fn status_changed(&self) -> mpsc::UnboundedReceiver<KernelStatus> {
        if self.shared.is_disposed() {
            return closed_stream();
        }
        self.shared.status_events.subscribe()
    }

    fn iopub_messages(&self) -> mpsc::UnboundedReceiver<JupyterMessage> {
        if self.shared.is_disposed() {
            return closed_stream();
        }
        self.shared.iopub_events.subscribe()
    }

    fn request_execute(
        &self,
        content: ExecuteRequest,
        dispose_on_done: bool,
        metadata: Option<Map<String, Value>>,
    ) -> Result<KernelFuture, KernelError> {
        let mut msg = self.shared.build(&content)?;
        if let Some(metadata) = metadata {
            msg = msg.with_metadata(metadata);
        }
        let options = FutureOptions {
            expect_reply: true,
            dispose_on_done,
        };
        self.shared.send_tracked(msg, options)
    }

    async fn request_inspect(&self, content: InspectRequest) -> Result<JupyterMessage, KernelError> {
        self.shared.request(&content).await
    }

    async fn request_complete(
        &self,
        content: CompleteRequest,
    ) -> Result<JupyterMessage, KernelError> {
        self.shared.request(&content).await
    }

    async fn request_kernel_info(&self) -> Result<JupyterMessage, KernelError> {
        self.shared.request(&KernelInfoRequest::default()).await
    }

    async fn request_history(
        &self,
        _content: HistoryRequest,
    ) -> Result<JupyterMessage, KernelError> {
        Err(KernelError::NotImplemented("request_history"))
    }

    fn send_input_reply(&self, content: InputReply) -> Result<(), KernelError> {
        let mut msg = self.shared.build(&content)?;
        if let Some(parent) = lock(&self.shared.last_input_request).take() {
            msg = msg.with_parent(&parent);
        }
        self.shared.send_untracked(msg)
    }

    fn register_comm_target(&self, target_name: &str) -> mpsc::UnboundedReceiver<JupyterMessage> {
        if self.shared.is_disposed() {
            return closed_stream();
        }
        lock(&self.shared.comm_targets)
            .entry(target_name.to_string())
            .or_default()
            .subscribe()
    }

    fn remove_comm_target(&self, target_name: &str) {
        lock(&self.shared.comm_targets).remove(target_name);
    }

    fn send_comm_message(&self, message: OutgoingComm) -> Result<KernelFuture, KernelError> {
        let mut msg = self.shared.builder.build(
            &self.shared.client_id,
            Channel::Shell,
            message.kind.msg_type(),
            message.content(),
        );
        msg = msg.with_metadata(message.metadata);
        msg.buffers = message.buffers;
        self.shared.send_tracked(msg, FutureOptions::until_idle())
    }

    async fn interrupt(&self) -> Result<(), KernelError> {
        self.shared
            .request(&InterruptRequest::default())
            .await
            .map(|_| ())
    }

    async fn restart(&self) -> Result<(), KernelError> {
        Err(KernelError::NotImplemented("restart"))
    }

    async fn reconnect(&self) -> Result<(), KernelError> {
        Err(KernelError::NotImplemented("reconnect"))
    }

    async fn shutdown(&self) -> Result<(), KernelError> {
        if self.shared.is_disposed() {
            return Ok(());
        }
        info!("Shutting down kernel {}", self.shared.kernel_id);
        let result = self
            .shared
            .request(&ShutdownRequest { restart: false })
            .await;
        self.shared.dispose();
        match result {
            Ok(_) | Err(KernelError::DisposedFuture) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn dispose(&self) {
        self.shared.dispose();
        if let Some(handle) = lock(&self.processor).take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::kernel_connection::CommMessageKind;
    use crate::test_support::{
        FakeTransport, SequentialMessageBuilder, connected_client, connection_info, flush, iopub,
        kernel_status, reply_to, request, status,
    };
    use serde_json::json;

    #[tokio::test]
    async fn status_is_unknown_after_connect() {
        let (client, _transport) = connected_client().await;
        assert_eq!(client.status(), KernelStatus::Unknown);
        assert!(!client.is_disposed());
        assert_ne!(client.id(), client.client_id());
    }

    #[tokio::test]
    async fn failed_connect_registers_nothing() {
        let transport = FakeTransport::refusing("connection refused");
        let client = RawKernelClient::new(transport, Arc::new(SequentialMessageBuilder::default()));
        let err = client.connect(&connection_info()).await.unwrap_err();
        assert_eq!(err, KernelError::Connection("connection refused".to_string()));
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn interleaved_replies_reach_their_own_futures() {
        let (client, transport) = connected_client().await;
        let a = client
            .request_execute(ExecuteRequest::new("a"), true, None)
            .unwrap();
        let b = client
            .request_execute(ExecuteRequest::new("b"), true, None)
            .unwrap();
        let mut a_stream = a.take_messages().unwrap();
        let mut b_stream = b.take_messages().unwrap();
        let (req_a, req_b) = (a.msg().clone(), b.msg().clone());

        transport.push(iopub(&req_b, "stream", json!({"text": "from b"})));
        transport.push(iopub(&req_a, "stream", json!({"text": "from a"})));
        transport.push(reply_to(&req_b, "execute_reply", json!({"status": "ok", "execution_count": 2})));
        transport.push(reply_to(&req_a, "execute_reply", json!({"status": "ok", "execution_count": 1})));

        let reply_a = a.done().await.unwrap();
        let reply_b = b.done().await.unwrap();
        assert_eq!(reply_a.parent_msg_id(), Some(req_a.msg_id()));
        assert_eq!(reply_b.parent_msg_id(), Some(req_b.msg_id()));
        assert_eq!(a_stream.recv().await.unwrap().content["text"], "from a");
        assert_eq!(b_stream.recv().await.unwrap().content["text"], "from b");
        assert!(a_stream.try_recv().is_err());
        assert!(b_stream.try_recv().is_err());
    }

    #[tokio::test]
    async fn request_is_registered_before_it_is_sent() {
        let (client, transport) = connected_client().await;
        let future = client
            .request_execute(ExecuteRequest::new("1"), false, None)
            .unwrap();
        assert_eq!(client.pending_requests(), 1);
        assert_eq!(transport.last_sent().msg_id(), future.msg_id());
        assert_eq!(transport.last_sent().channel, Some(Channel::Shell));
    }

    #[tokio::test]
    async fn send_failure_rejects_and_unregisters() {
        let (client, transport) = connected_client().await;
        transport.fail_sends();
        let err = client
            .request_execute(ExecuteRequest::new("1"), true, None)
            .unwrap_err();
        assert!(matches!(err, KernelError::Transport(_)));
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn completed_request_is_removed_after_idle() {
        let (client, transport) = connected_client().await;
        let future = client
            .request_execute(ExecuteRequest::new("1"), true, None)
            .unwrap();
        let req = future.msg().clone();
        transport.push(status(&req, "busy"));
        transport.push(reply_to(&req, "execute_reply", json!({"status": "ok"})));
        transport.push(status(&req, "idle"));
        future.done().await.unwrap();
        flush().await;
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn duplicate_reply_goes_nowhere_once_request_is_gone() {
        let (client, transport) = connected_client().await;
        let mut unhandled = client.unhandled_messages();
        let future = client
            .request_execute(ExecuteRequest::new("1"), true, None)
            .unwrap();
        let req = future.msg().clone();
        transport.push(reply_to(&req, "execute_reply", json!({"status": "ok", "n": 1})));
        transport.push(status(&req, "idle"));
        transport.push(reply_to(&req, "execute_reply", json!({"status": "ok", "n": 2})));

        assert_eq!(future.done().await.unwrap().content["n"], 1);
        let stray = unhandled.recv().await.unwrap();
        assert_eq!(stray.content["n"], 2);
    }

    #[tokio::test]
    async fn dispose_rejects_every_pending_request() {
        let (client, transport) = connected_client().await;
        let futures: Vec<_> = (0..3)
            .map(|i| {
                client
                    .request_execute(ExecuteRequest::new(i.to_string()), true, None)
                    .unwrap()
            })
            .collect();

        client.dispose();
        client.dispose();

        for future in &futures {
            assert_eq!(future.done().await, Err(KernelError::DisposedFuture));
        }
        assert_eq!(client.pending_requests(), 0);
        assert!(transport.is_disposed());
        assert_eq!(
            client
                .request_execute(ExecuteRequest::new("late"), true, None)
                .unwrap_err(),
            KernelError::Disconnected
        );
    }

    #[tokio::test]
    async fn iopub_messages_arrive_in_order() {
        let (client, transport) = connected_client().await;
        let mut iopub_stream = client.iopub_messages();
        for i in 0..5 {
            let mut msg = kernel_status("busy");
            msg.header.msg_type = "stream".to_string();
            msg.content = json!({"text": i});
            transport.push(msg);
        }
        for i in 0..5 {
            assert_eq!(iopub_stream.recv().await.unwrap().content["text"], i);
        }
    }

    #[tokio::test]
    async fn status_messages_update_status() {
        let (client, transport) = connected_client().await;
        let mut changes = client.status_changed();
        transport.push(kernel_status("busy"));
        transport.push(kernel_status("busy"));
        transport.push(kernel_status("idle"));

        assert_eq!(changes.recv().await, Some(KernelStatus::Busy));
        assert_eq!(changes.recv().await, Some(KernelStatus::Idle));
        assert_eq!(client.status(), KernelStatus::Idle);
    }

    #[tokio::test]
    async fn dead_status_disposes_client() {
        let (client, transport) = connected_client().await;
        let future = client
            .request_execute(ExecuteRequest::new("loop"), true, None)
            .unwrap();
        let mut changes = client.status_changed();
        transport.push(kernel_status("dead"));

        assert_eq!(future.done().await, Err(KernelError::DisposedFuture));
        assert_eq!(changes.recv().await, Some(KernelStatus::Dead));
        assert_eq!(changes.recv().await, None);
        assert!(client.is_disposed());
    }

    #[tokio::test]
    async fn peer_going_away_marks_kernel_dead() {
        let (client, transport) = connected_client().await;
        let future = client
            .request_execute(ExecuteRequest::new("1"), true, None)
            .unwrap();
        transport.close_from_peer();
        assert_eq!(future.done().await, Err(KernelError::DisposedFuture));
        assert_eq!(client.status(), KernelStatus::Dead);
    }

    #[tokio::test]
    async fn complete_returns_reply() {
        let (client, transport) = connected_client().await;
        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .request_complete(CompleteRequest {
                        code: "pri".to_string(),
                        cursor_pos: 3,
                    })
                    .await
            })
        };
        flush().await;
        let req = transport.last_sent();
        assert_eq!(req.msg_type(), "complete_request");
        transport.push(reply_to(&req, "complete_reply", json!({"status": "ok", "matches": ["print"]})));

        let reply = pending.await.unwrap().unwrap();
        assert_eq!(reply.content["matches"], json!(["print"]));
    }

    #[tokio::test]
    async fn error_reply_is_a_rejection() {
        let (client, transport) = connected_client().await;
        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.interrupt().await })
        };
        flush().await;
        let req = transport.last_sent();
        assert_eq!(req.channel, Some(Channel::Control));
        transport.push(reply_to(
            &req,
            "interrupt_reply",
            json!({"status": "error", "ename": "OSError", "evalue": "nope"}),
        ));

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            KernelError::Rejected {
                msg_type: "interrupt_reply".to_string(),
                message: "OSError: nope".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn lifecycle_stubs_are_not_implemented() {
        let (client, _transport) = connected_client().await;
        assert_eq!(
            client.restart().await,
            Err(KernelError::NotImplemented("restart"))
        );
        assert_eq!(
            client.reconnect().await,
            Err(KernelError::NotImplemented("reconnect"))
        );
        let history = HistoryRequest {
            output: false,
            raw: true,
            hist_access_type: "tail".to_string(),
            n: Some(10),
        };
        assert!(matches!(
            client.request_history(history).await,
            Err(KernelError::NotImplemented(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_sends_request_then_disposes() {
        let (client, transport) = connected_client().await;
        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.shutdown().await })
        };
        flush().await;
        let req = transport.last_sent();
        assert_eq!(req.msg_type(), "shutdown_request");
        assert_eq!(req.content["restart"], false);
        transport.push(reply_to(&req, "shutdown_reply", json!({"status": "ok"})));

        pending.await.unwrap().unwrap();
        assert!(client.is_disposed());
        assert!(transport.is_disposed());
    }

    #[tokio::test]
    async fn input_reply_answers_latest_input_request() {
        let (client, transport) = connected_client().await;
        let future = client
            .request_execute(ExecuteRequest::new("input()"), true, None)
            .unwrap();
        let mut stream = future.take_messages().unwrap();
        let mut prompt = reply_to(future.msg(), "input_request", json!({"prompt": "name?"}));
        prompt.channel = Some(Channel::Stdin);
        transport.push(prompt.clone());

        assert_eq!(stream.recv().await.unwrap().msg_type(), "input_request");
        client.send_input_reply(InputReply::ok("ada")).unwrap();

        let sent = transport.last_sent();
        assert_eq!(sent.channel, Some(Channel::Stdin));
        assert_eq!(sent.parent_msg_id(), Some(prompt.msg_id()));
        assert_eq!(sent.content["value"], "ada");
    }

    #[tokio::test]
    async fn comm_open_reaches_registered_target() {
        let (client, transport) = connected_client().await;
        let mut opens = client.register_comm_target("jupyter.widget");
        let mut open = kernel_status("busy");
        open.header.msg_type = "comm_open".to_string();
        open.content = json!({"comm_id": "c1", "target_name": "jupyter.widget", "data": {}});
        transport.push(open);

        let received = opens.recv().await.unwrap();
        assert_eq!(received.content["comm_id"], "c1");
        assert!(transport.sent_of_type("comm_close").is_empty());
    }

    #[tokio::test]
    async fn comm_open_for_unknown_target_is_closed() {
        let (_client, transport) = connected_client().await;
        let mut open = kernel_status("busy");
        open.header.msg_type = "comm_open".to_string();
        open.content = json!({"comm_id": "c9", "target_name": "nobody", "data": {}});
        transport.push(open);
        flush().await;

        let closes = transport.sent_of_type("comm_close");
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].content["comm_id"], "c9");
    }

    #[tokio::test]
    async fn comm_message_settles_on_idle() {
        let (client, transport) = connected_client().await;
        let future = client
            .send_comm_message(OutgoingComm::new(CommMessageKind::Msg, "c1", json!({"x": 1})))
            .unwrap();
        let req = transport.last_sent();
        assert_eq!(req.msg_type(), "comm_msg");
        assert_eq!(req.content["comm_id"], "c1");

        transport.push(status(&req, "busy"));
        transport.push(status(&req, "idle"));
        future.done().await.unwrap();
        flush().await;
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn is_complete_round_trip() {
        let (client, transport) = connected_client().await;
        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .request_is_complete(IsCompleteRequest {
                        code: "for x in y:".to_string(),
                    })
                    .await
            })
        };
        flush().await;
        let req = transport.last_sent();
        transport.push(reply_to(&req, "is_complete_reply", json!({"status": "incomplete", "indent": "    "})));
        let reply = pending.await.unwrap().unwrap();
        assert_eq!(reply.content["indent"], "    ");
    }

    #[tokio::test]
    async fn unhandled_replies_from_other_sessions_are_dropped() {
        let (client, transport) = connected_client().await;
        let mut unhandled = client.unhandled_messages();
        let future = client
            .request_execute(ExecuteRequest::new("1"), true, None)
            .unwrap();
        let ours = future.msg().clone();
        let theirs = request("execute_request", json!({}));

        transport.push(reply_to(&theirs, "execute_reply", json!({"status": "ok", "n": 1})));
        transport.push(reply_to(&ours, "execute_reply", json!({"status": "ok"})));
        transport.push(status(&ours, "idle"));
        transport.push(reply_to(&ours, "execute_reply", json!({"status": "ok", "n": 2})));
        future.done().await.unwrap();

        assert_eq!(unhandled.recv().await.unwrap().content["n"], 2);
        assert!(unhandled.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_parent_on_iopub_is_still_broadcast() {
        let (client, transport) = connected_client().await;
        let mut unhandled = client.unhandled_messages();
        let mut iopub_stream = client.iopub_messages();
        let stranger = request("execute_request", json!({}));
        transport.push(iopub(&stranger, "stream", json!({"text": "x"})));

        assert_eq!(iopub_stream.recv().await.unwrap().msg_type(), "stream");
        assert!(unhandled.try_recv().is_err());
    }
}

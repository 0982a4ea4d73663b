//! Widget message dispatcher.
//!
//! Bridges comm traffic between a [`JupyterSession`] and widget renderers:
//!
//! - comm targets requested before a kernel is attached stay pending and are
//!   registered as soon as one is,
//! - kernel-initiated `comm_open`s are cached per target and replayed when
//!   the same target is registered again,
//! - iopub `display_data` and `comm_msg` are re-published; `status` and
//!   `comm_open` on iopub are ignored (the latter arrives via its target),
//! - renderer-originated shell messages are sent as comm messages and their
//!   traffic is reported back tagged with the renderer's request id.

use crate::events::EventEmitter;
use crate::kernel::FutureOutcome;
use crate::ports::kernel_connection::{CommMessageKind, OutgoingComm};
use crate::session::JupyterSession;
use nbkernel_domain::{Channel, JupyterMessage, KernelError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Events published to widget renderers.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetMessage {
    CommOpen(JupyterMessage),
    CommMsg(JupyterMessage),
    DisplayData(JupyterMessage),
    /// Iopub traffic caused by a renderer's shell message.
    ShellSendOnIopub {
        request_id: String,
        msg: JupyterMessage,
    },
    /// A shell reply to a renderer's shell message.
    ShellSendReply {
        request_id: String,
        msg: JupyterMessage,
    },
    /// The renderer's shell message finished.
    ShellSendResolve {
        request_id: String,
        msg: JupyterMessage,
    },
    /// The renderer's shell message failed.
    ShellSendReject {
        request_id: String,
        error: KernelError,
    },
}

/// A shell message a widget renderer wants delivered to the kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellSendPayload {
    pub request_id: String,
    pub comm_id: String,
    /// `comm_open`, `comm_msg` or `comm_close`; anything else is sent as
    /// `comm_msg`.
    pub msg_type: String,
    pub target_name: Option<String>,
    pub data: Value,
    pub metadata: Map<String, Value>,
    pub buffers: Vec<Vec<u8>>,
}

impl ShellSendPayload {
    fn into_comm(self) -> OutgoingComm {
        let kind = CommMessageKind::from_msg_type(&self.msg_type).unwrap_or(CommMessageKind::Msg);
        OutgoingComm {
            kind,
            comm_id: self.comm_id,
            target_name: self.target_name,
            data: self.data,
            metadata: self.metadata,
            buffers: self.buffers,
        }
    }
}

#[derive(Default)]
struct DispatcherState {
    /// Registered targets and the last `comm_open` each one received.
    registered: HashMap<String, Option<JupyterMessage>>,
    pending: Vec<String>,
    iopub_attached: bool,
    tasks: Vec<JoinHandle<()>>,
}

struct DispatcherInner {
    session: Arc<JupyterSession>,
    messages: EventEmitter<WidgetMessage>,
    state: Mutex<DispatcherState>,
}

impl DispatcherInner {
    fn lock(&self) -> MutexGuard<'_, DispatcherState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register pending targets and attach to iopub, if a kernel is there.
    fn initialize(self: &Arc<Self>) -> Result<(), KernelError> {
        if self.session.kernel().is_none() {
            return Ok(());
        }
        let mut state = self.lock();

        for target in std::mem::take(&mut state.pending) {
            match state.registered.get(&target) {
                Some(Some(open)) => {
                    self.messages.fire(WidgetMessage::CommOpen(open.clone()));
                    continue;
                }
                Some(None) => continue,
                None => {}
            }
            let Some(opens) = self.session.register_comm_target(&target)? else {
                state.pending.push(target);
                continue;
            };
            debug!("Registered comm target '{}'", target);
            state.registered.insert(target.clone(), None);
            let task = tokio::spawn(listen_for_opens(Arc::downgrade(self), target, opens));
            state.tasks.push(task);
        }

        if !state.registered.is_empty()
            && !state.iopub_attached
            && let Some(iopub) = self.session.iopub_messages()?
        {
            state.iopub_attached = true;
            let task = tokio::spawn(listen_to_iopub(Arc::downgrade(self), iopub));
            state.tasks.push(task);
        }
        Ok(())
    }

    /// Subscriptions belong to the previous connection; start over.
    fn reset_for_new_kernel(&self) {
        let mut state = self.lock();
        let targets: Vec<String> = state.registered.drain().map(|(name, _)| name).collect();
        for target in targets {
            if !state.pending.contains(&target) {
                state.pending.push(target);
            }
        }
        state.iopub_attached = false;
        for task in state.tasks.drain(..) {
            task.abort();
        }
    }

    fn handle_iopub(&self, msg: JupyterMessage) {
        match msg.msg_type() {
            "display_data" => self.messages.fire(WidgetMessage::DisplayData(msg)),
            "comm_msg" => self.messages.fire(WidgetMessage::CommMsg(msg)),
            other => trace!("Widget dispatcher ignoring iopub {}", other),
        }
    }

    fn handle_shell_traffic(&self, request_id: &str, msg: JupyterMessage) {
        match msg.channel {
            Some(Channel::Iopub) => {
                let is_comm_msg = msg.msg_type() == "comm_msg";
                self.messages.fire(WidgetMessage::ShellSendOnIopub {
                    request_id: request_id.to_string(),
                    msg: msg.clone(),
                });
                if is_comm_msg && !self.lock().iopub_attached {
                    self.messages.fire(WidgetMessage::CommMsg(msg));
                }
            }
            Some(Channel::Shell) if msg.msg_type().ends_with("_reply") => {
                self.messages.fire(WidgetMessage::ShellSendReply {
                    request_id: request_id.to_string(),
                    msg,
                });
            }
            _ => trace!("Widget dispatcher ignoring {}", msg.msg_type()),
        }
    }

    fn settle_shell_send(&self, request_id: String, outcome: FutureOutcome) {
        let event = match outcome {
            Ok(msg) => WidgetMessage::ShellSendResolve { request_id, msg },
            Err(error) => WidgetMessage::ShellSendReject { request_id, error },
        };
        self.messages.fire(event);
    }
}

async fn listen_for_opens(
    inner: Weak<DispatcherInner>,
    target: String,
    mut opens: mpsc::UnboundedReceiver<JupyterMessage>,
) {
    while let Some(open) = opens.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner
            .lock()
            .registered
            .insert(target.clone(), Some(open.clone()));
        inner.messages.fire(WidgetMessage::CommOpen(open));
    }
}

async fn listen_to_iopub(
    inner: Weak<DispatcherInner>,
    mut iopub: mpsc::UnboundedReceiver<JupyterMessage>,
) {
    while let Some(msg) = iopub.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.handle_iopub(msg);
    }
}

/// Routes widget comm traffic for one session.
pub struct WidgetMessageDispatcher {
    inner: Arc<DispatcherInner>,
    watcher: JoinHandle<()>,
}

impl WidgetMessageDispatcher {
    /// Create a dispatcher for `session`. Must be called inside a Tokio
    /// runtime.
    pub fn new(session: Arc<JupyterSession>) -> Self {
        let mut kernel_changes = session.on_kernel_changed();
        let inner = Arc::new(DispatcherInner {
            session,
            messages: EventEmitter::new(),
            state: Mutex::new(DispatcherState::default()),
        });

        let weak = Arc::downgrade(&inner);
        let watcher = tokio::spawn(async move {
            while let Some(kernel_id) = kernel_changes.recv().await {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                debug!("Widget dispatcher attaching to kernel {}", kernel_id);
                inner.reset_for_new_kernel();
                if let Err(e) = inner.initialize() {
                    debug!("Widget dispatcher could not attach: {}", e);
                }
            }
        });

        Self { inner, watcher }
    }

    pub fn on_message(&self) -> mpsc::UnboundedReceiver<WidgetMessage> {
        self.inner.messages.subscribe()
    }

    /// Ask for `comm_open`s addressed to `target_name`.
    pub fn register_comm_target(&self, target_name: &str) -> Result<(), KernelError> {
        {
            let mut state = self.inner.lock();
            if !state.pending.iter().any(|t| t == target_name) {
                state.pending.push(target_name.to_string());
            }
        }
        self.inner.initialize()
    }

    /// Send a renderer's shell message and report its traffic back.
    ///
    /// Without an attached kernel the message is dropped.
    pub fn send_ipython_shell_msg(&self, payload: ShellSendPayload) -> Result<(), KernelError> {
        let request_id = payload.request_id.clone();
        let Some(future) = self.inner.session.send_comm_message(payload.into_comm())? else {
            debug!("No kernel; dropping widget shell message {}", request_id);
            return Ok(());
        };
        let Some(mut traffic) = future.take_messages() else {
            return Ok(());
        };

        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let done = future.done();
            tokio::pin!(done);
            let mut settled = false;
            loop {
                tokio::select! {
                    biased;
                    msg = traffic.recv() => match msg {
                        Some(msg) => match weak.upgrade() {
                            Some(inner) => inner.handle_shell_traffic(&request_id, msg),
                            None => return,
                        },
                        None => break,
                    },
                    outcome = &mut done, if !settled => {
                        settled = true;
                        if let Some(inner) = weak.upgrade() {
                            inner.settle_shell_send(request_id.clone(), outcome);
                        }
                    }
                }
            }
            if !settled
                && let Some(inner) = weak.upgrade()
            {
                let outcome = future.done().await;
                inner.settle_shell_send(request_id, outcome);
            }
        });

        let mut state = self.inner.lock();
        state.tasks.retain(|t| !t.is_finished());
        state.tasks.push(task);
        Ok(())
    }

    /// Stop listening and drop every registration.
    pub fn dispose(&self) {
        self.watcher.abort();
        let targets: Vec<String> = {
            let mut state = self.inner.lock();
            for task in state.tasks.drain(..) {
                task.abort();
            }
            state.pending.clear();
            state.iopub_attached = false;
            state.registered.drain().map(|(name, _)| name).collect()
        };
        for target in targets {
            self.inner.session.remove_comm_target(&target);
        }
        self.inner.messages.clear();
    }
}

impl Drop for WidgetMessageDispatcher {
    fn drop(&mut self) {
        self.watcher.abort();
        for task in self.inner.lock().tasks.drain(..) {
            task.abort();
        }
    }
}

//! Port for a live connection to one kernel.
//!
//! [`KernelConnection`] is what the session façade talks to. The raw client
//! ([`RawKernelClient`](crate::kernel::RawKernelClient)) implements it over a
//! [`Transport`](super::transport::Transport); a Jupyter server adapter can
//! implement it over REST plus a websocket.

use crate::kernel::KernelFuture;
use async_trait::async_trait;
use nbkernel_domain::{
    CompleteRequest, ExecuteRequest, HistoryRequest, InputReply, InspectRequest, JupyterMessage,
    KernelError, KernelStatus,
};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// Kind of an outgoing comm message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommMessageKind {
    Open,
    Msg,
    Close,
}

impl CommMessageKind {
    pub fn msg_type(&self) -> &'static str {
        match self {
            CommMessageKind::Open => "comm_open",
            CommMessageKind::Msg => "comm_msg",
            CommMessageKind::Close => "comm_close",
        }
    }

    /// Parse a wire `msg_type`.
    pub fn from_msg_type(msg_type: &str) -> Option<Self> {
        match msg_type {
            "comm_open" => Some(CommMessageKind::Open),
            "comm_msg" => Some(CommMessageKind::Msg),
            "comm_close" => Some(CommMessageKind::Close),
            _ => None,
        }
    }
}

/// A comm message to send to the kernel on the shell channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingComm {
    pub kind: CommMessageKind,
    pub comm_id: String,
    /// Only meaningful for `comm_open`.
    pub target_name: Option<String>,
    pub data: Value,
    pub metadata: Map<String, Value>,
    pub buffers: Vec<Vec<u8>>,
}

impl OutgoingComm {
    pub fn new(kind: CommMessageKind, comm_id: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            comm_id: comm_id.into(),
            target_name: None,
            data,
            metadata: Map::new(),
            buffers: Vec::new(),
        }
    }

    pub fn with_target(mut self, target_name: impl Into<String>) -> Self {
        self.target_name = Some(target_name.into());
        self
    }

    /// Wire content for this message.
    pub fn content(&self) -> Value {
        let mut content = Map::new();
        content.insert("comm_id".to_string(), Value::String(self.comm_id.clone()));
        content.insert("data".to_string(), self.data.clone());
        if let Some(target) = &self.target_name {
            content.insert("target_name".to_string(), Value::String(target.clone()));
        }
        Value::Object(content)
    }
}

/// A live, bidirectional connection to a kernel.
///
/// Lifecycle operations that a particular connection kind cannot perform
/// return [`KernelError::NotImplemented`].
#[async_trait]
pub trait KernelConnection: Send + Sync {
    /// Identity of the kernel.
    fn id(&self) -> &str;

    /// Identity of this client; used as the `session` of outgoing headers.
    fn client_id(&self) -> &str;

    fn status(&self) -> KernelStatus;

    fn is_disposed(&self) -> bool;

    /// Stream of raw status transitions.
    fn status_changed(&self) -> mpsc::UnboundedReceiver<KernelStatus>;

    /// Stream of every iopub message, after per-request routing.
    fn iopub_messages(&self) -> mpsc::UnboundedReceiver<JupyterMessage>;

    /// Start an execution. The returned future streams iopub output and
    /// settles on the `execute_reply`.
    fn request_execute(
        &self,
        content: ExecuteRequest,
        dispose_on_done: bool,
        metadata: Option<Map<String, Value>>,
    ) -> Result<KernelFuture, KernelError>;

    async fn request_inspect(&self, content: InspectRequest) -> Result<JupyterMessage, KernelError>;

    async fn request_complete(
        &self,
        content: CompleteRequest,
    ) -> Result<JupyterMessage, KernelError>;

    async fn request_kernel_info(&self) -> Result<JupyterMessage, KernelError>;

    async fn request_history(&self, content: HistoryRequest) -> Result<JupyterMessage, KernelError>;

    /// Answer the most recent `input_request`.
    fn send_input_reply(&self, content: InputReply) -> Result<(), KernelError>;

    /// Stream of `comm_open` messages addressed to `target_name`.
    fn register_comm_target(&self, target_name: &str) -> mpsc::UnboundedReceiver<JupyterMessage>;

    fn remove_comm_target(&self, target_name: &str);

    fn send_comm_message(&self, message: OutgoingComm) -> Result<KernelFuture, KernelError>;

    async fn interrupt(&self) -> Result<(), KernelError>;

    async fn restart(&self) -> Result<(), KernelError>;

    async fn reconnect(&self) -> Result<(), KernelError>;

    /// Ask the kernel to exit, then dispose the connection.
    async fn shutdown(&self) -> Result<(), KernelError>;

    /// Tear down the connection and reject every pending future. Idempotent.
    fn dispose(&self);
}

//! A raw client paired with a lifecycle controller.

use async_trait::async_trait;
use nbkernel_application::{KernelConnection, KernelFuture, OutgoingComm, RawKernelClient};
use nbkernel_domain::{
    CompleteRequest, ExecuteRequest, HistoryRequest, InputReply, InspectRequest, JupyterMessage,
    KernelError, KernelStatus,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle operations that depend on how the kernel is hosted.
#[async_trait]
pub trait KernelControl: Send + Sync {
    async fn interrupt(&self, client: &RawKernelClient) -> Result<(), KernelError>;

    async fn restart(&self, client: &RawKernelClient) -> Result<(), KernelError>;

    /// Stop the kernel. The client must be disposed afterwards.
    async fn shutdown(&self, client: &RawKernelClient) -> Result<(), KernelError>;

    /// Release hosting resources immediately. Idempotent.
    fn dispose(&self);
}

/// A [`KernelConnection`] whose messaging is a [`RawKernelClient`] and whose
/// lifecycle is a [`KernelControl`].
pub struct ManagedKernel {
    client: Arc<RawKernelClient>,
    control: Box<dyn KernelControl>,
}

impl ManagedKernel {
    pub fn new(client: Arc<RawKernelClient>, control: Box<dyn KernelControl>) -> Self {
        Self { client, control }
    }

    pub fn client(&self) -> &Arc<RawKernelClient> {
        &self.client
    }
}

#[async_trait]
impl KernelConnection for ManagedKernel {
    fn id(&self) -> &str {
        self.client.id()
    }

    fn client_id(&self) -> &str {
        self.client.client_id()
    }

    fn status(&self) -> KernelStatus {
        self.client.status()
    }

    fn is_disposed(&self) -> bool {
        self.client.is_disposed()
    }

    fn status_changed(&self) -> mpsc::UnboundedReceiver<KernelStatus> {
        self.client.status_changed()
    }

    fn iopub_messages(&self) -> mpsc::UnboundedReceiver<JupyterMessage> {
        self.client.iopub_messages()
    }

    fn request_execute(
        &self,
        content: ExecuteRequest,
        dispose_on_done: bool,
        metadata: Option<Map<String, Value>>,
    ) -> Result<KernelFuture, KernelError> {
        self.client.request_execute(content, dispose_on_done, metadata)
    }

    async fn request_inspect(&self, content: InspectRequest) -> Result<JupyterMessage, KernelError> {
        self.client.request_inspect(content).await
    }

    async fn request_complete(
        &self,
        content: CompleteRequest,
    ) -> Result<JupyterMessage, KernelError> {
        self.client.request_complete(content).await
    }

    async fn request_kernel_info(&self) -> Result<JupyterMessage, KernelError> {
        self.client.request_kernel_info().await
    }

    async fn request_history(&self, content: HistoryRequest) -> Result<JupyterMessage, KernelError> {
        self.client.request_history(content).await
    }

    fn send_input_reply(&self, content: InputReply) -> Result<(), KernelError> {
        self.client.send_input_reply(content)
    }

    fn register_comm_target(&self, target_name: &str) -> mpsc::UnboundedReceiver<JupyterMessage> {
        self.client.register_comm_target(target_name)
    }

    fn remove_comm_target(&self, target_name: &str) {
        self.client.remove_comm_target(target_name)
    }

    fn send_comm_message(&self, message: OutgoingComm) -> Result<KernelFuture, KernelError> {
        self.client.send_comm_message(message)
    }

    async fn interrupt(&self) -> Result<(), KernelError> {
        self.control.interrupt(&self.client).await
    }

    async fn restart(&self) -> Result<(), KernelError> {
        self.control.restart(&self.client).await
    }

    async fn reconnect(&self) -> Result<(), KernelError> {
        self.client.reconnect().await
    }

    async fn shutdown(&self) -> Result<(), KernelError> {
        let result = self.control.shutdown(&self.client).await;
        self.client.dispose();
        result
    }

    fn dispose(&self) {
        self.client.dispose();
        self.control.dispose();
    }
}

impl Drop for ManagedKernel {
    fn drop(&mut self) {
        self.control.dispose();
    }
}

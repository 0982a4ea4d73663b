//! Raw kernels: launched locally or attached through a connection file.

use super::managed::{KernelControl, ManagedKernel};
use crate::launcher::{KernelLauncher, KernelProcess};
use async_trait::async_trait;
use nbkernel_application::{
    KernelConnection, KernelConnectionFactory, MessageBuilder, MessageLogger, NoMessageLogger,
    RawKernelClient, RawKernelOptions, Transport,
};
use nbkernel_domain::{ConnectionInfo, InterruptMode, KernelError, KernelSelection, KernelSpec};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a kernel may take to exit after `shutdown_request`.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Creates a fresh transport for each connection.
pub type TransportMaker = Arc<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;

/// Lifecycle of a raw kernel.
///
/// With a process, interrupts follow the kernelspec's `interrupt_mode` and
/// the transport is torn down when the process exits. Without one (an
/// attached kernel), interrupts are control messages.
pub struct ProcessControl {
    process: Option<KernelProcess>,
    interrupt_mode: InterruptMode,
    exit_watch: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessControl {
    pub fn launched(process: KernelProcess, interrupt_mode: InterruptMode, transport: Arc<dyn Transport>) -> Self {
        let exited = process.exited();
        let pid = process.pid();
        let exit_watch = tokio::spawn(async move {
            exited.cancelled().await;
            debug!("Kernel process {:?} gone, closing transport", pid);
            transport.dispose();
        });
        Self {
            process: Some(process),
            interrupt_mode,
            exit_watch: Mutex::new(Some(exit_watch)),
        }
    }

    pub fn attached() -> Self {
        Self {
            process: None,
            interrupt_mode: InterruptMode::Message,
            exit_watch: Mutex::new(None),
        }
    }
}

#[async_trait]
impl KernelControl for ProcessControl {
    async fn interrupt(&self, client: &RawKernelClient) -> Result<(), KernelError> {
        match (&self.process, self.interrupt_mode) {
            (Some(process), InterruptMode::Signal) => Ok(process.interrupt()?),
            _ => client.interrupt().await,
        }
    }

    async fn restart(&self, _client: &RawKernelClient) -> Result<(), KernelError> {
        Err(KernelError::NotImplemented("restart"))
    }

    async fn shutdown(&self, client: &RawKernelClient) -> Result<(), KernelError> {
        let result = client.shutdown().await;
        if let Some(process) = &self.process {
            process.terminate(SHUTDOWN_GRACE).await;
        }
        result
    }

    fn dispose(&self) {
        if let Some(watch) = self
            .exit_watch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            watch.abort();
        }
        if let Some(process) = &self.process {
            process.kill();
        }
    }
}

/// [`KernelConnectionFactory`] for raw kernels.
///
/// - `Spec` launches a new process
/// - `Running` attaches to an existing kernel's connection info
/// - `Live` is rejected; live kernels belong to a Jupyter server
///
/// Restarting shuts the old kernel down and launches a replacement.
pub struct RawKernelFactory {
    launcher: KernelLauncher,
    builder: Arc<dyn MessageBuilder>,
    logger: Arc<dyn MessageLogger>,
    make_transport: TransportMaker,
}

impl RawKernelFactory {
    pub fn new(
        launcher: KernelLauncher,
        builder: Arc<dyn MessageBuilder>,
        make_transport: TransportMaker,
    ) -> Self {
        Self {
            launcher,
            builder,
            logger: Arc::new(NoMessageLogger),
            make_transport,
        }
    }

    /// Factory over ZeroMQ sockets.
    #[cfg(feature = "zmq")]
    pub fn zmq(launcher: KernelLauncher, builder: Arc<dyn MessageBuilder>) -> Self {
        Self::new(
            launcher,
            builder,
            Arc::new(|| Arc::new(crate::transport::ZmqTransport::new()) as Arc<dyn Transport>),
        )
    }

    pub fn with_logger(mut self, logger: Arc<dyn MessageLogger>) -> Self {
        self.logger = logger;
        self
    }

    fn client(&self, transport: Arc<dyn Transport>) -> Arc<RawKernelClient> {
        Arc::new(RawKernelClient::with_options(
            transport,
            Arc::clone(&self.builder),
            RawKernelOptions {
                kernel_id: None,
                logger: Arc::clone(&self.logger),
            },
        ))
    }

    async fn launch(&self, spec: &KernelSpec) -> Result<Arc<dyn KernelConnection>, KernelError> {
        let process = self.launcher.launch(spec).await?;
        let transport = (self.make_transport)();
        let client = self.client(Arc::clone(&transport));
        if let Err(e) = client.connect(process.info()).await {
            warn!("Could not connect to kernel '{}': {}", spec.name, e);
            process.kill();
            return Err(e);
        }
        info!("Kernel '{}' connected as {}", spec.name, client.id());
        let control = ProcessControl::launched(process, spec.interrupt_mode, transport);
        Ok(Arc::new(ManagedKernel::new(client, Box::new(control))))
    }

    async fn attach(&self, info: &ConnectionInfo) -> Result<Arc<dyn KernelConnection>, KernelError> {
        let client = self.client((self.make_transport)());
        client.connect(info).await?;
        info!("Attached to running kernel as {}", client.id());
        Ok(Arc::new(ManagedKernel::new(
            client,
            Box::new(ProcessControl::attached()),
        )))
    }
}

#[async_trait]
impl KernelConnectionFactory for RawKernelFactory {
    async fn connect(
        &self,
        selection: &KernelSelection,
    ) -> Result<Arc<dyn KernelConnection>, KernelError> {
        match selection {
            KernelSelection::Spec(spec) => self.launch(spec).await,
            KernelSelection::Running(info) => self.attach(info).await,
            KernelSelection::Live { name, .. } => Err(KernelError::Connection(format!(
                "kernel '{}' is hosted by a Jupyter server",
                name
            ))),
        }
    }

    async fn restart(
        &self,
        current: Arc<dyn KernelConnection>,
        selection: &KernelSelection,
    ) -> Result<Arc<dyn KernelConnection>, KernelError> {
        let KernelSelection::Spec(spec) = selection else {
            return Err(KernelError::NotImplemented("restart"));
        };
        info!("Restarting kernel '{}'", spec.name);
        if let Err(e) = current.shutdown().await {
            warn!("Kernel {} did not shut down cleanly: {}", current.id(), e);
        }
        current.dispose();
        self.launch(spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::LaunchConfig;
    use crate::message_builder::StandardMessageBuilder;
    use crate::transport::LoopbackTransport;
    use nbkernel_domain::{Channel, Header, JupyterMessage};
    use serde_json::json;

    fn info() -> ConnectionInfo {
        ConnectionInfo {
            version: 5,
            transport: "tcp".to_string(),
            ip: "127.0.0.1".to_string(),
            shell_port: 1,
            iopub_port: 2,
            stdin_port: 3,
            hb_port: 4,
            control_port: 5,
            signature_scheme: "hmac-sha256".to_string(),
            key: "secret".to_string(),
            kernel_name: Some("python3".to_string()),
        }
    }

    fn loopback_factory(dir: &std::path::Path) -> (RawKernelFactory, Arc<LoopbackTransport>) {
        let transport = Arc::new(LoopbackTransport::new());
        let shared = Arc::clone(&transport);
        let factory = RawKernelFactory::new(
            KernelLauncher::new(LaunchConfig {
                ip: "127.0.0.1".to_string(),
                connection_dir: dir.to_path_buf(),
            }),
            Arc::new(StandardMessageBuilder::default()),
            Arc::new(move || Arc::clone(&shared) as Arc<dyn Transport>),
        );
        (factory, transport)
    }

    fn reply(request: &JupyterMessage, msg_type: &str) -> JupyterMessage {
        JupyterMessage::new(
            Header::new("reply", msg_type, "kernel", "kernel", ""),
            request.channel.unwrap_or(Channel::Shell),
            json!({"status": "ok"}),
        )
        .with_parent(&request.header)
    }

    #[tokio::test]
    async fn attached_kernel_answers_over_the_wire() {
        let dir = tempfile::tempdir().unwrap();
        let (factory, transport) = loopback_factory(dir.path());
        let mut kernel_side = transport.outbound();

        let connection = factory
            .connect(&KernelSelection::Running(info()))
            .await
            .unwrap();

        let kernel = Arc::clone(&transport);
        tokio::spawn(async move {
            while let Some(request) = kernel_side.recv().await {
                let msg_type = request.msg_type().replace("_request", "_reply");
                kernel.inject(reply(&request, &msg_type)).unwrap();
            }
        });

        let info_reply = connection.request_kernel_info().await.unwrap();
        assert_eq!(info_reply.msg_type(), "kernel_info_reply");

        connection.interrupt().await.unwrap();
        let sent = transport.sent();
        let interrupt = sent
            .iter()
            .find(|m| m.msg_type() == "interrupt_request")
            .unwrap();
        assert_eq!(interrupt.channel, Some(Channel::Control));
    }

    #[tokio::test]
    async fn live_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (factory, _) = loopback_factory(dir.path());
        let result = factory
            .connect(&KernelSelection::Live {
                id: "k1".to_string(),
                name: "python3".to_string(),
            })
            .await;
        assert!(matches!(result, Err(KernelError::Connection(_))));
    }

    #[tokio::test]
    async fn launch_failure_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let (factory, _) = loopback_factory(dir.path());
        let spec: KernelSpec = serde_json::from_value(json!({
            "name": "missing",
            "argv": ["/nonexistent/kernel-binary", "-f", "{connection_file}"],
            "display_name": "Missing",
            "language": "none"
        }))
        .unwrap();

        let result = factory.connect(&KernelSelection::Spec(spec)).await;
        assert!(matches!(result, Err(KernelError::Connection(_))));
    }

    #[tokio::test]
    async fn attached_kernels_cannot_be_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let (factory, _) = loopback_factory(dir.path());
        let selection = KernelSelection::Running(info());
        let connection = factory.connect(&selection).await.unwrap();

        let result = factory.restart(connection, &selection).await;
        assert!(matches!(result, Err(KernelError::NotImplemented(_))));
    }
}

//! Kernels hosted by a Jupyter server.
//!
//! Lifecycle goes through the REST API (`/api/kernels`); messaging goes
//! through the kernel's channels websocket.

use super::managed::{KernelControl, ManagedKernel};
use crate::transport::WebSocketTransport;
use async_trait::async_trait;
use nbkernel_application::{
    KernelConnection, KernelConnectionFactory, MessageBuilder, MessageLogger, NoMessageLogger,
    RawKernelClient, RawKernelOptions,
};
use nbkernel_domain::{ConnectionInfo, KernelError, KernelSelection};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// A kernel as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerKernel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub execution_state: Option<String>,
}

/// Minimal client for the kernels REST API.
#[derive(Debug, Clone)]
pub struct JupyterServerClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

fn server_error(e: impl std::fmt::Display) -> KernelError {
    KernelError::Connection(e.to_string())
}

impl JupyterServerClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, KernelError> {
        let mut base_url = Url::parse(base_url).map_err(server_error)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn endpoint(&self, path: &str) -> Result<Url, KernelError> {
        self.base_url.join(path).map_err(server_error)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {}", token)),
            None => request,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, KernelError> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        self.authorize(self.http.post(url))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(server_error)
    }

    pub async fn list_kernels(&self) -> Result<Vec<ServerKernel>, KernelError> {
        let url = self.endpoint("api/kernels")?;
        self.authorize(self.http.get(url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(server_error)?
            .json()
            .await
            .map_err(server_error)
    }

    pub async fn start_kernel(&self, name: &str) -> Result<ServerKernel, KernelError> {
        self.post("api/kernels", serde_json::json!({ "name": name }))
            .await?
            .json()
            .await
            .map_err(server_error)
    }

    pub async fn interrupt_kernel(&self, id: &str) -> Result<(), KernelError> {
        self.post(&format!("api/kernels/{}/interrupt", id), serde_json::json!({}))
            .await
            .map(|_| ())
    }

    pub async fn restart_kernel(&self, id: &str) -> Result<(), KernelError> {
        self.post(&format!("api/kernels/{}/restart", id), serde_json::json!({}))
            .await
            .map(|_| ())
    }

    pub async fn shutdown_kernel(&self, id: &str) -> Result<(), KernelError> {
        let url = self.endpoint(&format!("api/kernels/{}", id))?;
        debug!("DELETE {}", url);
        self.authorize(self.http.delete(url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(server_error)
    }

    /// `ws(s)://.../api/kernels/<id>/channels`.
    pub fn channels_url(&self, id: &str) -> Result<Url, KernelError> {
        let mut url = self.endpoint(&format!("api/kernels/{}/channels", id))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| server_error(format!("cannot use {} for websockets", url)))?;
        Ok(url)
    }
}

/// Lifecycle of a server kernel, via REST.
pub struct ServerControl {
    server: Arc<JupyterServerClient>,
    kernel_id: String,
}

#[async_trait]
impl KernelControl for ServerControl {
    async fn interrupt(&self, _client: &RawKernelClient) -> Result<(), KernelError> {
        self.server.interrupt_kernel(&self.kernel_id).await
    }

    async fn restart(&self, _client: &RawKernelClient) -> Result<(), KernelError> {
        self.server.restart_kernel(&self.kernel_id).await
    }

    async fn shutdown(&self, _client: &RawKernelClient) -> Result<(), KernelError> {
        self.server.shutdown_kernel(&self.kernel_id).await
    }

    fn dispose(&self) {}
}

/// [`KernelConnectionFactory`] for a Jupyter server.
///
/// - `Spec` starts a kernel by name
/// - `Live` attaches to an existing kernel
/// - `Running` is rejected; connection files belong to raw kernels
///
/// Restarts happen in place and return the same connection.
pub struct JupyterServerFactory {
    server: Arc<JupyterServerClient>,
    builder: Arc<dyn MessageBuilder>,
    logger: Arc<dyn MessageLogger>,
}

impl JupyterServerFactory {
    pub fn new(server: JupyterServerClient, builder: Arc<dyn MessageBuilder>) -> Self {
        Self {
            server: Arc::new(server),
            builder,
            logger: Arc::new(NoMessageLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn MessageLogger>) -> Self {
        self.logger = logger;
        self
    }

    async fn attach(&self, id: &str, name: &str) -> Result<Arc<dyn KernelConnection>, KernelError> {
        let url = self.server.channels_url(id)?;
        let transport = Arc::new(WebSocketTransport::new(
            url.clone(),
            self.server.token().map(str::to_string),
        ));
        let client = Arc::new(RawKernelClient::with_options(
            transport,
            Arc::clone(&self.builder),
            RawKernelOptions {
                kernel_id: Some(id.to_string()),
                logger: Arc::clone(&self.logger),
            },
        ));
        client.connect(&websocket_info(&url, name)).await?;
        info!("Attached to server kernel {} ({})", id, name);

        let control = ServerControl {
            server: Arc::clone(&self.server),
            kernel_id: id.to_string(),
        };
        Ok(Arc::new(ManagedKernel::new(client, Box::new(control))))
    }
}

/// Connection info describing a websocket endpoint. Signing is done by the
/// server, so there is no key.
fn websocket_info(url: &Url, kernel_name: &str) -> ConnectionInfo {
    let port = url.port_or_known_default().unwrap_or_default();
    ConnectionInfo {
        version: 5,
        transport: url.scheme().to_string(),
        ip: url.host_str().unwrap_or_default().to_string(),
        shell_port: port,
        iopub_port: port,
        stdin_port: port,
        hb_port: port,
        control_port: port,
        signature_scheme: String::new(),
        key: String::new(),
        kernel_name: Some(kernel_name.to_string()),
    }
}

#[async_trait]
impl KernelConnectionFactory for JupyterServerFactory {
    async fn connect(
        &self,
        selection: &KernelSelection,
    ) -> Result<Arc<dyn KernelConnection>, KernelError> {
        match selection {
            KernelSelection::Spec(spec) => {
                let kernel = self.server.start_kernel(&spec.name).await?;
                info!("Server started kernel {} ({})", kernel.id, kernel.name);
                self.attach(&kernel.id, &kernel.name).await
            }
            KernelSelection::Live { id, name } => self.attach(id, name).await,
            KernelSelection::Running(_) => Err(KernelError::Connection(
                "connection files cannot be used with a Jupyter server".to_string(),
            )),
        }
    }

    async fn restart(
        &self,
        current: Arc<dyn KernelConnection>,
        _selection: &KernelSelection,
    ) -> Result<Arc<dyn KernelConnection>, KernelError> {
        current.restart().await?;
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_url_switches_to_websocket_scheme() {
        let client = JupyterServerClient::new("https://hub.example.com/user/me", None).unwrap();
        assert_eq!(
            client.channels_url("k1").unwrap().as_str(),
            "wss://hub.example.com/user/me/api/kernels/k1/channels"
        );

        let local = JupyterServerClient::new("http://localhost:8888", None).unwrap();
        assert_eq!(
            local.channels_url("k2").unwrap().as_str(),
            "ws://localhost:8888/api/kernels/k2/channels"
        );
    }

    #[test]
    fn websocket_info_has_no_signing_key() {
        let url = Url::parse("ws://localhost:8888/api/kernels/k1/channels").unwrap();
        let info = websocket_info(&url, "python3");
        assert!(info.key.is_empty());
        assert_eq!(info.ip, "localhost");
        assert_eq!(info.shell_port, 8888);
    }

    #[test]
    fn server_kernel_parses_rest_payload() {
        let kernel: ServerKernel = serde_json::from_value(serde_json::json!({
            "id": "k1",
            "name": "python3",
            "last_activity": "2024-01-01T00:00:00Z",
            "execution_state": "idle",
            "connections": 0
        }))
        .unwrap();
        assert_eq!(kernel.execution_state.as_deref(), Some("idle"));
    }
}

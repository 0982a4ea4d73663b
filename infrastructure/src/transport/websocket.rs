//! Jupyter server kernel-channels websocket.
//!
//! All four channels share one socket; messages travel as JSON text with a
//! `channel` field.

use crate::wire::{from_json_text, to_json_text};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use nbkernel_application::{Transport, TransportError};
use nbkernel_domain::{ConnectionInfo, JupyterMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

#[derive(Default)]
struct WsState {
    outbound: Option<mpsc::UnboundedSender<JupyterMessage>>,
    inbound: Option<mpsc::UnboundedReceiver<JupyterMessage>>,
    subscribed: bool,
    task: Option<JoinHandle<()>>,
}

/// Transport over `/api/kernels/<id>/channels`.
///
/// The [`ConnectionInfo`] passed to `connect` is ignored; the endpoint is
/// fixed at construction.
pub struct WebSocketTransport {
    url: Url,
    token: Option<String>,
    state: Mutex<WsState>,
    disposed: AtomicBool,
    cancel: CancellationToken,
}

impl WebSocketTransport {
    pub fn new(url: Url, token: Option<String>) -> Self {
        Self {
            url,
            token,
            state: Mutex::new(WsState::default()),
            disposed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn session_url(&self, session_id: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("session_id", session_id);
        url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, _info: &ConnectionInfo, session_id: &str) -> Result<(), TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Closed);
        }
        let url = self.session_url(session_id);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("token {}", token))
                .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("{}: {}", self.url, e)))?;
        debug!("Websocket connected to {}", self.url);

        let (mut sink, mut reader) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<JupyterMessage>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let cancel = self.cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    incoming = reader.next() => match incoming {
                        Some(Ok(Message::Text(text))) => match from_json_text(&text) {
                            Ok(message) => {
                                trace!("ws <- {}", message.msg_type());
                                if inbound_tx.send(message).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping malformed websocket message: {}", e),
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            warn!("Websocket error: {}", e);
                            break;
                        }
                        Some(Ok(_)) => {}
                    },
                    outgoing = outbound_rx.recv() => {
                        let Some(message) = outgoing else { break };
                        let text = match to_json_text(&message) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("Could not encode {}: {}", message.msg_type(), e);
                                continue;
                            }
                        };
                        trace!("ws -> {}", message.msg_type());
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            warn!("Websocket send failed: {}", e);
                            break;
                        }
                    }
                }
            }
            let _ = sink.close().await;
            debug!("Websocket task stopped");
        });

        let mut state = self.lock();
        if let Some(previous) = state.task.replace(task) {
            previous.abort();
        }
        state.outbound = Some(outbound_tx);
        state.inbound = Some(inbound_rx);
        state.subscribed = false;
        Ok(())
    }

    fn send(&self, message: JupyterMessage) -> Result<(), TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Closed);
        }
        let state = self.lock();
        let tx = state.outbound.as_ref().ok_or(TransportError::NotConnected)?;
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
        state.outbound = None;
        state.inbound = None;
        if let Some(task) = state.task.take() {
            task.abort();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_appended_to_the_channels_url() {
        let transport = WebSocketTransport::new(
            Url::parse("ws://localhost:8888/api/kernels/k1/channels").unwrap(),
            None,
        );
        assert_eq!(
            transport.session_url("abc").as_str(),
            "ws://localhost:8888/api/kernels/k1/channels?session_id=abc"
        );
    }
}

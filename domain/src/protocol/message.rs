//! The Jupyter message envelope.

use super::channel::Channel;
use super::header::{Header, optional_header};
use crate::kernel::status::KernelStatus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A complete protocol message as exchanged with a kernel.
///
/// `buffers` carries the optional binary frames that follow the content
/// frame on the wire; they are never part of the JSON text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JupyterMessage {
    pub header: Header,
    #[serde(with = "optional_header", default)]
    pub parent_header: Option<Header>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(skip)]
    pub buffers: Vec<Vec<u8>>,
}

impl JupyterMessage {
    pub fn new(header: Header, channel: Channel, content: Value) -> Self {
        Self {
            header,
            parent_header: None,
            metadata: Map::new(),
            content,
            channel: Some(channel),
            buffers: Vec::new(),
        }
    }

    /// Mark this message as a response to `parent`.
    pub fn with_parent(mut self, parent: &Header) -> Self {
        self.parent_header = Some(parent.clone());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn msg_id(&self) -> &str {
        &self.header.msg_id
    }

    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    /// The correlation key: the originating request's `msg_id`, if any.
    pub fn parent_msg_id(&self) -> Option<&str> {
        self.parent_header.as_ref().map(|h| h.msg_id.as_str())
    }

    /// Whether this is a terminal `*_reply` on a reply-carrying channel.
    ///
    /// Messages without a channel designation are judged by type alone.
    pub fn is_reply(&self) -> bool {
        let on_reply_channel = self.channel.map(|c| c.carries_replies()).unwrap_or(true);
        on_reply_channel && self.msg_type().ends_with("_reply")
    }

    /// `execution_state` of an iopub `status` message.
    pub fn execution_state(&self) -> Option<KernelStatus> {
        if self.msg_type() != "status" {
            return None;
        }
        self.content
            .get("execution_state")
            .and_then(|s| s.as_str())
            .map(KernelStatus::from_wire)
    }

    /// `content.status` of a reply (`ok`, `error`, `abort`).
    pub fn reply_status(&self) -> Option<&str> {
        self.content.get("status").and_then(|s| s.as_str())
    }

    /// Deserialize the content into a typed payload.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.content)
    }
}

//! Multipart and JSON text framing.
//!
//! A message on a ZeroMQ socket is:
//!
//! ```text
//! [identities..., "<IDS|MSG>", signature, header, parent_header, metadata, content, buffers...]
//! ```
//!
//! The signature covers the four JSON frames in that order.

use super::error::WireError;
use super::signer::MessageSigner;
use bytes::Bytes;
use nbkernel_domain::{Channel, Header, JupyterMessage};
use serde_json::{Map, Value};

/// Separates routing identities from the message proper.
pub const DELIMITER: &[u8] = b"<IDS|MSG>";

const JSON_FRAMES: usize = 4;

/// Encodes and decodes signed multipart messages.
#[derive(Debug, Clone)]
pub struct WireCodec {
    signer: MessageSigner,
}

impl WireCodec {
    pub fn new(signer: MessageSigner) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &MessageSigner {
        &self.signer
    }

    /// Frame `message`, prefixed by `identities`.
    pub fn encode(&self, message: &JupyterMessage, identities: &[Bytes]) -> Result<Vec<Bytes>, WireError> {
        let header = serde_json::to_vec(&message.header)?;
        let parent_header = match &message.parent_header {
            Some(parent) => serde_json::to_vec(parent)?,
            None => b"{}".to_vec(),
        };
        let metadata = serde_json::to_vec(&message.metadata)?;
        let content = serde_json::to_vec(&message.content)?;
        let signature = self
            .signer
            .sign(&[&header[..], &parent_header[..], &metadata[..], &content[..]]);

        let mut frames = Vec::with_capacity(identities.len() + 6 + message.buffers.len());
        frames.extend(identities.iter().cloned());
        frames.push(Bytes::from_static(DELIMITER));
        frames.push(Bytes::from(signature));
        frames.push(Bytes::from(header));
        frames.push(Bytes::from(parent_header));
        frames.push(Bytes::from(metadata));
        frames.push(Bytes::from(content));
        frames.extend(message.buffers.iter().map(|b| Bytes::copy_from_slice(b)));
        Ok(frames)
    }

    /// Parse frames received on `channel`, verifying the signature.
    ///
    /// Identities before the delimiter are discarded.
    pub fn decode(&self, frames: &[Bytes], channel: Channel) -> Result<JupyterMessage, WireError> {
        let delimiter = frames
            .iter()
            .position(|frame| frame.as_ref() == DELIMITER)
            .ok_or(WireError::MissingDelimiter)?;
        let rest = &frames[delimiter + 1..];
        if rest.len() < JSON_FRAMES + 1 {
            return Err(WireError::TooFewFrames {
                expected: JSON_FRAMES + 1,
                actual: rest.len(),
            });
        }

        let (signature, rest) = (&rest[0], &rest[1..]);
        self.signer
            .verify(signature, &[&rest[0][..], &rest[1][..], &rest[2][..], &rest[3][..]])?;

        let header: Header = serde_json::from_slice(&rest[0])?;
        let parent_header = match serde_json::from_slice::<Value>(&rest[1])? {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            other => Some(serde_json::from_value::<Header>(other)?),
        };
        let metadata: Map<String, Value> = serde_json::from_slice(&rest[2])?;
        let content: Value = serde_json::from_slice(&rest[3])?;
        let buffers = rest[JSON_FRAMES..].iter().map(|b| b.to_vec()).collect();

        Ok(JupyterMessage {
            header,
            parent_header,
            metadata,
            content,
            channel: Some(channel),
            buffers,
        })
    }
}

/// JSON text form of a message (websocket framing). Binary buffers are
/// not carried.
pub fn to_json_text(message: &JupyterMessage) -> Result<String, WireError> {
    Ok(serde_json::to_string(message)?)
}

pub fn from_json_text(text: &str) -> Result<JupyterMessage, WireError> {
    Ok(serde_json::from_str(text)?)
}

//! Error types for the wire codec

use nbkernel_application::TransportError;
use thiserror::Error;

/// Errors raised while framing, signing or parsing messages.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Missing <IDS|MSG> delimiter")]
    MissingDelimiter,

    #[error("Expected {expected} frames after the delimiter, got {actual}")]
    TooFewFrames { expected: usize, actual: usize },

    #[error("Message signature does not match")]
    BadSignature,

    #[error("Unsupported signature scheme: {0}")]
    UnsupportedScheme(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<WireError> for TransportError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::UnsupportedScheme(scheme) => TransportError::UnsupportedSignatureScheme(scheme),
            other => TransportError::Encode(other.to_string()),
        }
    }
}

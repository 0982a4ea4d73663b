//! Jupyter wire format.
//!
//! - [`signer::MessageSigner`]: HMAC signatures over the JSON frames
//! - [`codec::WireCodec`]: multipart framing used on ZeroMQ sockets
//! - [`codec::to_json_text`] / [`codec::from_json_text`]: the JSON text
//!   form used on the Jupyter server websocket

pub mod codec;
pub mod error;
pub mod signer;

pub use codec::{DELIMITER, WireCodec, from_json_text, to_json_text};
pub use error::WireError;
pub use signer::MessageSigner;

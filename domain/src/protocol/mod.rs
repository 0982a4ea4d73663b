//! Jupyter messaging protocol model.
//!
//! Wire-level shapes that must round-trip unchanged with a real kernel:
//!
//! - [`message::JupyterMessage`]: the `{header, parent_header, metadata,
//!   content, channel, buffers}` envelope
//! - [`header::Header`]: per-message identity, used for correlation
//! - [`channel::Channel`]: `shell`, `control`, `iopub`, `stdin`
//! - [`content`]: typed request/reply payloads
//! - [`connection_info::ConnectionInfo`]: handshake parameters

pub mod channel;
pub mod connection_info;
pub mod content;
pub mod header;
pub mod message;

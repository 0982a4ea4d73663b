//! Domain layer for nbkernel
//!
//! This crate contains the protocol model and the pure state rules of a
//! Jupyter kernel session. It has no dependencies on async runtimes,
//! transports, or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Messages
//!
//! Every exchange with a kernel is a [`JupyterMessage`]. A reply is tied to
//! its request by `parent_header.msg_id`; that correlation id is the key the
//! application layer demultiplexes on.
//!
//! ## Status
//!
//! Kernels report a rich [`KernelStatus`]; consumers see the six-valued
//! [`SessionStatus`] obtained by [`SessionStatus::fold`].
//!
//! ## Busy tracking
//!
//! [`BusyCounters`] counts in-flight operations per [`BusyReason`] so code
//! completion can be skipped while the kernel is running user code.

pub mod core;
pub mod kernel;
pub mod protocol;
pub mod session;

// Re-export commonly used types
pub use core::error::KernelError;
pub use kernel::{
    selection::KernelSelection,
    spec::{CONNECTION_FILE_PLACEHOLDER, InterruptMode, KernelSpec},
    status::KernelStatus,
};
pub use protocol::{
    channel::Channel,
    connection_info::ConnectionInfo,
    content::{
        CommClose, CommMsg, CommOpen, CompleteReply, CompleteRequest, ErrorContent, ExecuteReply,
        ExecuteRequest, HistoryRequest, InputReply, InspectReply, InspectRequest,
        InterruptRequest, IsCompleteRequest, KernelInfoRequest, RequestContent, ShutdownRequest,
    },
    header::{Header, PROTOCOL_VERSION},
    message::JupyterMessage,
};
pub use session::{
    busy::{BusyCounters, BusyReason},
    status::SessionStatus,
};

//! Application layer for nbkernel
//!
//! Kernel futures, the raw kernel client, the session façade and widget
//! dispatch, plus the ports the infrastructure layer implements.
//! It depends only on the domain layer.

pub mod config;
pub mod events;
pub mod kernel;
pub mod ports;
pub mod session;
pub mod widgets;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::SessionConfig;
pub use events::EventEmitter;
pub use kernel::{
    FutureOptions, FutureOutcome, FutureState, KernelFuture, RawKernelClient, RawKernelOptions,
};
pub use ports::{
    connection_factory::KernelConnectionFactory,
    kernel_connection::{CommMessageKind, KernelConnection, OutgoingComm},
    message_builder::MessageBuilder,
    message_logger::{Direction, MessageLogger, NoMessageLogger},
    transport::{Transport, TransportError},
};
pub use session::{BusyTracker, JupyterSession};
pub use widgets::{ShellSendPayload, WidgetMessage, WidgetMessageDispatcher};

//! Infrastructure layer for nbkernel
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the Jupyter wire format, transports,
//! kernel launching, connection factories, message logging and
//! configuration file loading.

pub mod config;
pub mod connection;
pub mod launcher;
pub mod logging;
pub mod message_builder;
pub mod transport;
pub mod wire;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileKernelConfig, FileLoggingConfig,
    FileServerConfig, FileSessionConfig,
};
pub use connection::{KernelControl, ManagedKernel, ProcessControl, RawKernelFactory};
#[cfg(feature = "server")]
pub use connection::{JupyterServerClient, JupyterServerFactory};
pub use launcher::{KernelLauncher, KernelProcess, KernelSpecStore, LaunchConfig, LaunchError};
pub use logging::JsonlMessageLogger;
pub use message_builder::StandardMessageBuilder;
pub use transport::LoopbackTransport;
#[cfg(feature = "server")]
pub use transport::WebSocketTransport;
#[cfg(feature = "zmq")]
pub use transport::ZmqTransport;
pub use wire::{MessageSigner, WireCodec, WireError};

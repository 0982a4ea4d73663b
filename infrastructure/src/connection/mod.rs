//! [`KernelConnection`](nbkernel_application::KernelConnection) adapters and
//! their factories.
//!
//! Messaging always goes through a
//! [`RawKernelClient`](nbkernel_application::RawKernelClient); what differs
//! is who controls the kernel's lifecycle:
//!
//! - [`RawKernelFactory`] launches local processes (or attaches to a
//!   connection file) and interrupts by signal or control message
//! - `JupyterServerFactory` (feature `server`) drives a Jupyter server's
//!   REST API

pub mod managed;
pub mod raw;
#[cfg(feature = "server")]
pub mod server;

pub use managed::{KernelControl, ManagedKernel};
pub use raw::{ProcessControl, RawKernelFactory, TransportMaker};
#[cfg(feature = "server")]
pub use server::{JupyterServerClient, JupyterServerFactory, ServerControl};

//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod connection_factory;
pub mod kernel_connection;
pub mod message_builder;
pub mod message_logger;
pub mod transport;

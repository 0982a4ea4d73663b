//! Logging infrastructure: structured message logging.
//!
//! Provides [`JsonlMessageLogger`], a JSONL file writer that implements
//! the [`MessageLogger`](nbkernel_application::MessageLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlMessageLogger;

//! Presentation layer for nbkernel
//!
//! This crate contains CLI definitions, output formatters for kernel
//! messages, and the kernel status spinner.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, Command, OutputFormat};
pub use output::{console::ConsoleFormatter, formatter::MessageFormatter, json::JsonFormatter};
pub use progress::reporter::StatusReporter;

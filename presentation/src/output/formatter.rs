//! Output formatter trait

use nbkernel_domain::{JupyterMessage, KernelSpec};

/// Trait for formatting kernel output
pub trait MessageFormatter: Send + Sync {
    /// Format one message from an execution's stream.
    ///
    /// Returns `None` for messages that produce no visible output.
    fn format_message(&self, msg: &JupyterMessage) -> Option<String>;

    /// Format the terminal reply of an execution.
    fn format_reply(&self, reply: &JupyterMessage) -> Option<String>;

    /// Format a kernelspec listing.
    fn format_kernelspecs(&self, specs: &[KernelSpec]) -> String;
}

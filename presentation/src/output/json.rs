//! JSON lines output

use crate::output::formatter::MessageFormatter;
use nbkernel_domain::{JupyterMessage, KernelSpec};

/// Emits each message as one line of JSON, for piping into other tools
pub struct JsonFormatter;

impl MessageFormatter for JsonFormatter {
    fn format_message(&self, msg: &JupyterMessage) -> Option<String> {
        serde_json::to_string(msg).ok()
    }

    fn format_reply(&self, reply: &JupyterMessage) -> Option<String> {
        serde_json::to_string(reply).ok()
    }

    fn format_kernelspecs(&self, specs: &[KernelSpec]) -> String {
        serde_json::to_string_pretty(specs).unwrap_or_else(|_| "[]".to_string())
    }
}

//! Console output formatter for kernel messages

use crate::output::formatter::MessageFormatter;
use colored::Colorize;
use nbkernel_domain::{ErrorContent, JupyterMessage, KernelSpec, SessionStatus};
use serde_json::Value;

/// Renders kernel output the way a terminal console would
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// `text/plain` of a mime bundle, or a note listing what was sent.
    fn mime_bundle(data: &Value) -> String {
        if let Some(text) = data.get("text/plain").and_then(Value::as_str) {
            return text.to_string();
        }
        let kinds: Vec<&str> = data
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        format!("<{}>", kinds.join(", ")).dimmed().to_string()
    }

    fn error(content: &ErrorContent) -> String {
        if content.traceback.is_empty() {
            format!("{}: {}", content.ename.red().bold(), content.evalue)
        } else {
            content.traceback.join("\n")
        }
    }

    /// Status label for the spinner and log lines.
    pub fn status(status: SessionStatus) -> String {
        let label = status.as_str();
        match status {
            SessionStatus::Idle => label.green().to_string(),
            SessionStatus::Busy => label.yellow().to_string(),
            SessionStatus::Dead => label.red().bold().to_string(),
            _ => label.cyan().to_string(),
        }
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl MessageFormatter for ConsoleFormatter {
    fn format_message(&self, msg: &JupyterMessage) -> Option<String> {
        let content = &msg.content;
        match msg.msg_type() {
            "stream" => {
                let text = content.get("text").and_then(Value::as_str)?;
                let text = text.strip_suffix('\n').unwrap_or(text);
                if content.get("name").and_then(Value::as_str) == Some("stderr") {
                    Some(text.red().to_string())
                } else {
                    Some(text.to_string())
                }
            }
            "execute_result" => {
                let data = Self::mime_bundle(content.get("data")?);
                let prompt = match content.get("execution_count").and_then(Value::as_u64) {
                    Some(n) => format!("Out[{}]:", n),
                    None => "Out:".to_string(),
                };
                Some(format!("{} {}", prompt.red().bold(), data))
            }
            "display_data" | "update_display_data" => {
                Some(Self::mime_bundle(content.get("data")?))
            }
            "error" => msg.content_as::<ErrorContent>().ok().map(|e| Self::error(&e)),
            _ => None,
        }
    }

    fn format_reply(&self, reply: &JupyterMessage) -> Option<String> {
        match reply.reply_status() {
            Some("abort") => Some("Execution aborted".yellow().to_string()),
            _ => None,
        }
    }

    fn format_kernelspecs(&self, specs: &[KernelSpec]) -> String {
        if specs.is_empty() {
            return "No kernelspecs found".dimmed().to_string();
        }
        let width = specs.iter().map(|s| s.name.len()).max().unwrap_or(0);
        let mut output = format!("{}\n", "Available kernels:".cyan().bold());
        for spec in specs {
            output.push_str(&format!(
                "  {}  {} {}\n",
                format!("{:width$}", spec.name, width = width).bold(),
                spec.display_name,
                format!("({})", spec.language).dimmed(),
            ));
        }
        output
    }
}

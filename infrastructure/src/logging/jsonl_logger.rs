//! JSONL file writer for protocol messages.
//!
//! Each message is written as a single JSON line carrying its direction,
//! channel, type, ids and a timestamp, appended via a buffered writer.

use nbkernel_application::{Direction, MessageLogger};
use nbkernel_domain::JupyterMessage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// JSONL message logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlMessageLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlMessageLogger {
    /// Create a new logger writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create message log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create message log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn record(direction: Direction, message: &JupyterMessage) -> serde_json::Value {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let mut record = serde_json::json!({
        "timestamp": timestamp,
        "direction": direction.as_str(),
        "channel": message.channel.map(|c| c.as_str()),
        "msg_type": message.msg_type(),
        "msg_id": message.msg_id(),
        "parent_msg_id": message.parent_msg_id(),
    });
    if let Some(state) = message.execution_state() {
        record["execution_state"] = serde_json::Value::String(state.to_string());
    }
    record
}

impl MessageLogger for JsonlMessageLogger {
    fn log(&self, direction: Direction, message: &JupyterMessage) {
        let Ok(line) = serde_json::to_string(&record(direction, message)) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlMessageLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

//! Port for constructing outgoing protocol messages.

use nbkernel_domain::{Channel, JupyterMessage};
use serde_json::Value;

/// Builds fully formed messages (fresh `msg_id`, timestamp, username).
///
/// Identifier and clock sources live behind this port so the kernel client
/// stays deterministic under test.
pub trait MessageBuilder: Send + Sync {
    /// Build a message for `session` on `channel`.
    fn build(&self, session: &str, channel: Channel, msg_type: &str, content: Value)
    -> JupyterMessage;
}

//! Production [`MessageBuilder`]: random message ids and wall-clock dates.

use nbkernel_application::MessageBuilder;
use nbkernel_domain::{Channel, Header, JupyterMessage};
use serde_json::Value;

/// Builds messages with UUID v4 ids and RFC 3339 timestamps.
#[derive(Debug, Clone)]
pub struct StandardMessageBuilder {
    username: String,
}

impl StandardMessageBuilder {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Default for StandardMessageBuilder {
    fn default() -> Self {
        Self::new("nbkernel")
    }
}

impl MessageBuilder for StandardMessageBuilder {
    fn build(&self, session: &str, channel: Channel, msg_type: &str, content: Value) -> JupyterMessage {
        let header = Header::new(
            uuid::Uuid::new_v4().to_string(),
            msg_type,
            session,
            self.username.as_str(),
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        );
        JupyterMessage::new(header, channel, content)
    }
}

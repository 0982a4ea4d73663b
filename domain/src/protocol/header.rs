//! Message header

use serde::{Deserialize, Serialize};

/// Protocol version spoken by this client.
pub const PROTOCOL_VERSION: &str = "5.3";

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

/// Identity of a single protocol message.
///
/// A reply's `parent_header.msg_id` equals the originating request's
/// `header.msg_id`; that pair is the correlation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub msg_id: String,
    pub msg_type: String,
    pub session: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub date: String,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Header {
    pub fn new(
        msg_id: impl Into<String>,
        msg_type: impl Into<String>,
        session: impl Into<String>,
        username: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            msg_id: msg_id.into(),
            msg_type: msg_type.into(),
            session: session.into(),
            username: username.into(),
            date: date.into(),
            version: default_version(),
        }
    }
}

/// Serde adapter for `parent_header`, which is `{}` on the wire when absent.
pub(crate) mod optional_header {
    use super::Header;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Header>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(header) => header.serialize(serializer),
            None => serde_json::Map::new().serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Header>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        match value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
            Some(other) => serde_json::from_value(other)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

//! Raw kernel lifecycle status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by an underlying kernel connection.
///
/// This is the richer vocabulary of the protocol and of server-mediated
/// connections. It is folded onto the six-valued
/// [`SessionStatus`](crate::session::status::SessionStatus) for consumers.
/// Unrecognised strings are preserved in [`Other`](Self::Other) rather than
/// rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KernelStatus {
    #[default]
    Unknown,
    Starting,
    Idle,
    Busy,
    Connected,
    Restarting,
    Autorestarting,
    Reconnecting,
    Dead,
    Other(String),
}

impl KernelStatus {
    /// Parse a status string as it appears in `execution_state` or a
    /// server kernel model.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "unknown" => KernelStatus::Unknown,
            "starting" => KernelStatus::Starting,
            "idle" => KernelStatus::Idle,
            "busy" => KernelStatus::Busy,
            "connected" => KernelStatus::Connected,
            "restarting" => KernelStatus::Restarting,
            "autorestarting" => KernelStatus::Autorestarting,
            "reconnecting" => KernelStatus::Reconnecting,
            "dead" => KernelStatus::Dead,
            other => KernelStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            KernelStatus::Unknown => "unknown",
            KernelStatus::Starting => "starting",
            KernelStatus::Idle => "idle",
            KernelStatus::Busy => "busy",
            KernelStatus::Connected => "connected",
            KernelStatus::Restarting => "restarting",
            KernelStatus::Autorestarting => "autorestarting",
            KernelStatus::Reconnecting => "reconnecting",
            KernelStatus::Dead => "dead",
            KernelStatus::Other(s) => s,
        }
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, KernelStatus::Dead)
    }
}

impl From<String> for KernelStatus {
    fn from(s: String) -> Self {
        KernelStatus::from_wire(&s)
    }
}

impl From<KernelStatus> for String {
    fn from(status: KernelStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for KernelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Jupyter channel designation

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four message channels between a client and a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Request/reply channel for execute, inspect, complete, comm traffic.
    Shell,
    /// Priority request/reply channel (interrupt, shutdown, debug).
    Control,
    /// Kernel broadcast channel: status, streams, display data, comm events.
    Iopub,
    /// Kernel-initiated input requests answered by `input_reply`.
    Stdin,
}

impl Channel {
    /// All channels, in the order sockets are opened.
    pub const ALL: [Channel; 4] = [
        Channel::Shell,
        Channel::Control,
        Channel::Iopub,
        Channel::Stdin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Shell => "shell",
            Channel::Control => "control",
            Channel::Iopub => "iopub",
            Channel::Stdin => "stdin",
        }
    }

    /// Whether terminal `*_reply` messages travel on this channel.
    pub fn carries_replies(&self) -> bool {
        matches!(self, Channel::Shell | Channel::Control)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shell" => Ok(Channel::Shell),
            "control" => Ok(Channel::Control),
            "iopub" => Ok(Channel::Iopub),
            "stdin" => Ok(Channel::Stdin),
            other => Err(format!("unknown channel: {}", other)),
        }
    }
}

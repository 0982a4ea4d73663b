//! Kernel connection file contents

use super::channel::Channel;
use serde::{Deserialize, Serialize};

/// Handshake parameters for a raw kernel connection.
///
/// This is exactly the JSON a kernel reads from (or writes to) its
/// connection file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default)]
    pub version: u32,
    pub transport: String,
    pub ip: String,
    pub shell_port: u16,
    pub iopub_port: u16,
    pub stdin_port: u16,
    pub hb_port: u16,
    pub control_port: u16,
    pub signature_scheme: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_name: Option<String>,
}

impl ConnectionInfo {
    pub fn port(&self, channel: Channel) -> u16 {
        match channel {
            Channel::Shell => self.shell_port,
            Channel::Control => self.control_port,
            Channel::Iopub => self.iopub_port,
            Channel::Stdin => self.stdin_port,
        }
    }

    /// Endpoint address for a port, e.g. `tcp://127.0.0.1:55196`.
    ///
    /// The `ipc` transport names sockets `<ip>-<port>`.
    pub fn endpoint(&self, port: u16) -> String {
        match self.transport.as_str() {
            "ipc" => format!("ipc://{}-{}", self.ip, port),
            transport => format!("{}://{}:{}", transport, self.ip, port),
        }
    }

    pub fn channel_endpoint(&self, channel: Channel) -> String {
        self.endpoint(self.port(channel))
    }

    pub fn heartbeat_endpoint(&self) -> String {
        self.endpoint(self.hb_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionInfo {
        serde_json::from_value(serde_json::json!({
            "version": 0,
            "transport": "tcp",
            "ip": "127.0.0.1",
            "shell_port": 55196,
            "iopub_port": 55197,
            "stdin_port": 55198,
            "hb_port": 55200,
            "control_port": 55199,
            "signature_scheme": "hmac-sha256",
            "key": "adaf9032-487d222a85026db284c3d5e7"
        }))
        .unwrap()
    }

    #[test]
    fn tcp_endpoints() {
        let info = sample();
        assert_eq!(info.channel_endpoint(Channel::Shell), "tcp://127.0.0.1:55196");
        assert_eq!(info.channel_endpoint(Channel::Control), "tcp://127.0.0.1:55199");
        assert_eq!(info.heartbeat_endpoint(), "tcp://127.0.0.1:55200");
    }

    #[test]
    fn ipc_endpoints_use_dash_separator() {
        let info = ConnectionInfo {
            transport: "ipc".to_string(),
            ip: "/tmp/kernel".to_string(),
            ..sample()
        };
        assert_eq!(info.channel_endpoint(Channel::Iopub), "ipc:///tmp/kernel-55197");
    }

    #[test]
    fn kernel_name_is_optional_on_the_wire() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("kernel_name").is_none());
    }
}

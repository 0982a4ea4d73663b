//! Typed message payloads.
//!
//! Request types implement [`RequestContent`], which pins the `msg_type`
//! and channel each one travels on so builders cannot mislabel them.

use super::channel::Channel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A payload that can be sent to a kernel as a request.
pub trait RequestContent: Serialize {
    const MSG_TYPE: &'static str;
    const CHANNEL: Channel;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    #[serde(default)]
    pub silent: bool,
    #[serde(default = "default_true")]
    pub store_history: bool,
    #[serde(default)]
    pub user_expressions: Map<String, Value>,
    #[serde(default = "default_true")]
    pub allow_stdin: bool,
    #[serde(default = "default_true")]
    pub stop_on_error: bool,
}

fn default_true() -> bool {
    true
}

impl ExecuteRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            silent: false,
            store_history: true,
            user_expressions: Map::new(),
            allow_stdin: true,
            stop_on_error: true,
        }
    }

    /// Execute without recording history or echoing output counters.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self.store_history = false;
        self
    }
}

impl RequestContent for ExecuteRequest {
    const MSG_TYPE: &'static str = "execute_request";
    const CHANNEL: Channel = Channel::Shell;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub code: String,
    pub cursor_pos: usize,
}

impl RequestContent for CompleteRequest {
    const MSG_TYPE: &'static str = "complete_request";
    const CHANNEL: Channel = Channel::Shell;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectRequest {
    pub code: String,
    pub cursor_pos: usize,
    #[serde(default)]
    pub detail_level: u8,
}

impl RequestContent for InspectRequest {
    const MSG_TYPE: &'static str = "inspect_request";
    const CHANNEL: Channel = Channel::Shell;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsCompleteRequest {
    pub code: String,
}

impl RequestContent for IsCompleteRequest {
    const MSG_TYPE: &'static str = "is_complete_request";
    const CHANNEL: Channel = Channel::Shell;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInfoRequest {}

impl RequestContent for KernelInfoRequest {
    const MSG_TYPE: &'static str = "kernel_info_request";
    const CHANNEL: Channel = Channel::Shell;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub output: bool,
    pub raw: bool,
    pub hist_access_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
}

impl RequestContent for HistoryRequest {
    const MSG_TYPE: &'static str = "history_request";
    const CHANNEL: Channel = Channel::Shell;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptRequest {}

impl RequestContent for InterruptRequest {
    const MSG_TYPE: &'static str = "interrupt_request";
    const CHANNEL: Channel = Channel::Control;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownRequest {
    pub restart: bool,
}

impl RequestContent for ShutdownRequest {
    const MSG_TYPE: &'static str = "shutdown_request";
    const CHANNEL: Channel = Channel::Control;
}

/// Answer to a kernel-initiated `input_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputReply {
    pub value: String,
    pub status: String,
}

impl InputReply {
    pub fn ok(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status: "ok".to_string(),
        }
    }
}

impl RequestContent for InputReply {
    const MSG_TYPE: &'static str = "input_reply";
    const CHANNEL: Channel = Channel::Stdin;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommOpen {
    pub comm_id: String,
    pub target_name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_module: Option<String>,
}

impl RequestContent for CommOpen {
    const MSG_TYPE: &'static str = "comm_open";
    const CHANNEL: Channel = Channel::Shell;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommMsg {
    pub comm_id: String,
    #[serde(default)]
    pub data: Value,
}

impl RequestContent for CommMsg {
    const MSG_TYPE: &'static str = "comm_msg";
    const CHANNEL: Channel = Channel::Shell;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommClose {
    pub comm_id: String,
    #[serde(default)]
    pub data: Value,
}

impl RequestContent for CommClose {
    const MSG_TYPE: &'static str = "comm_close";
    const CHANNEL: Channel = Channel::Shell;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteReply {
    pub status: String,
    #[serde(default)]
    pub execution_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteReply {
    pub status: String,
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub cursor_start: usize,
    #[serde(default)]
    pub cursor_end: usize,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectReply {
    pub status: String,
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// `error` iopub content and the error fields of a failed reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContent {
    #[serde(default)]
    pub ename: String,
    #[serde(default)]
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
}

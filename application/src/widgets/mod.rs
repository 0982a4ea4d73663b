//! Widget (comm) traffic between a session and widget renderers.

pub mod dispatcher;

pub use dispatcher::{ShellSendPayload, WidgetMessage, WidgetMessageDispatcher};

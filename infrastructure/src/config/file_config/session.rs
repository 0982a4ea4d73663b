//! Session configuration from TOML (`[session]` section).

use super::ConfigValidationError;
use nbkernel_application::SessionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw `[session]` section. Timeouts are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    pub interrupt_timeout_ms: u64,
    pub restart_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
    /// Skip completions while code is running
    pub busy_tracking: bool,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            interrupt_timeout_ms: defaults.interrupt_timeout.as_millis() as u64,
            restart_timeout_ms: defaults.restart_timeout.as_millis() as u64,
            idle_timeout_ms: defaults.idle_timeout.as_millis() as u64,
            shutdown_timeout_ms: defaults.shutdown_timeout.as_millis() as u64,
            busy_tracking: defaults.busy_tracking,
        }
    }
}

impl FileSessionConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let timeouts = [
            ("session.interrupt_timeout_ms", self.interrupt_timeout_ms),
            ("session.restart_timeout_ms", self.restart_timeout_ms),
            ("session.idle_timeout_ms", self.idle_timeout_ms),
            ("session.shutdown_timeout_ms", self.shutdown_timeout_ms),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(ConfigValidationError::ZeroTimeout { field });
            }
        }
        Ok(())
    }

    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_interrupt_timeout(Duration::from_millis(self.interrupt_timeout_ms))
            .with_restart_timeout(Duration::from_millis(self.restart_timeout_ms))
            .with_idle_timeout(Duration::from_millis(self.idle_timeout_ms))
            .with_shutdown_timeout(Duration::from_millis(self.shutdown_timeout_ms))
            .with_busy_tracking(self.busy_tracking)
    }
}

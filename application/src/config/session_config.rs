//! Session parameters: deadlines and busy tracking.
//!
//! [`SessionConfig`] groups the caller-tunable knobs of
//! [`JupyterSession`](crate::session::JupyterSession). Every lifecycle wait
//! has an explicit deadline; on expiry the operation fails with
//! `KernelPromiseTimeout` while the kernel-side work carries on.

use std::time::Duration;

/// Session behavior parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Deadline for an interrupt to be acknowledged.
    pub interrupt_timeout: Duration,
    /// Deadline for a restart, including the wait for `idle` afterwards.
    pub restart_timeout: Duration,
    /// Deadline for a kernel to become idle after connect or kernel change.
    pub idle_timeout: Duration,
    /// Deadline for a graceful shutdown before the connection is torn down.
    pub shutdown_timeout: Duration,
    /// Skip code completion while code is running or variables are inspected.
    pub busy_tracking: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interrupt_timeout: Duration::from_secs(5),
            restart_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(5),
            busy_tracking: true,
        }
    }
}

impl SessionConfig {
    // ==================== Builder Methods ====================

    pub fn with_interrupt_timeout(mut self, timeout: Duration) -> Self {
        self.interrupt_timeout = timeout;
        self
    }

    pub fn with_restart_timeout(mut self, timeout: Duration) -> Self {
        self.restart_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_busy_tracking(mut self, enabled: bool) -> Self {
        self.busy_tracking = enabled;
        self
    }
}

//! Session status and the kernel-status folding rule

use crate::kernel::status::KernelStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a session as observed by the notebook/editor layer.
///
/// Never stored: always derived from the underlying connection's
/// [`KernelStatus`] via [`SessionStatus::fold`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    NotStarted,
    Starting,
    Idle,
    Busy,
    Restarting,
    Dead,
}

impl SessionStatus {
    /// Fold a raw kernel status onto the session status.
    ///
    /// Total and deterministic: every raw value maps to exactly one status,
    /// and anything unrecognised maps to `NotStarted`.
    ///
    /// | raw                                      | session      |
    /// |------------------------------------------|--------------|
    /// | busy                                     | `Busy`       |
    /// | dead                                     | `Dead`       |
    /// | idle, connected                          | `Idle`       |
    /// | restarting, autorestarting, reconnecting | `Restarting` |
    /// | starting                                 | `Starting`   |
    /// | anything else                            | `NotStarted` |
    pub fn fold(raw: &KernelStatus) -> Self {
        match raw {
            KernelStatus::Busy => SessionStatus::Busy,
            KernelStatus::Dead => SessionStatus::Dead,
            KernelStatus::Idle | KernelStatus::Connected => SessionStatus::Idle,
            KernelStatus::Restarting
            | KernelStatus::Autorestarting
            | KernelStatus::Reconnecting => SessionStatus::Restarting,
            KernelStatus::Starting => SessionStatus::Starting,
            KernelStatus::Unknown | KernelStatus::Other(_) => SessionStatus::NotStarted,
        }
    }

    /// Status when there may be no underlying connection at all.
    pub fn fold_optional(raw: Option<&KernelStatus>) -> Self {
        raw.map(Self::fold).unwrap_or(SessionStatus::NotStarted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not started",
            SessionStatus::Starting => "starting",
            SessionStatus::Idle => "idle",
            SessionStatus::Busy => "busy",
            SessionStatus::Restarting => "restarting",
            SessionStatus::Dead => "dead",
        }
    }
}

impl From<&KernelStatus> for SessionStatus {
    fn from(raw: &KernelStatus) -> Self {
        SessionStatus::fold(raw)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

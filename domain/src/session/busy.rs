//! Busy-status record used to keep code completion out of the way of
//! user code execution and variable inspection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session is considered busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusyReason {
    ExecutingCode,
    InspectingVariables,
    ProvidingCodeCompletion,
}

impl BusyReason {
    pub const ALL: [BusyReason; 3] = [
        BusyReason::ExecutingCode,
        BusyReason::InspectingVariables,
        BusyReason::ProvidingCodeCompletion,
    ];

    fn index(self) -> usize {
        match self {
            BusyReason::ExecutingCode => 0,
            BusyReason::InspectingVariables => 1,
            BusyReason::ProvidingCodeCompletion => 2,
        }
    }
}

impl fmt::Display for BusyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BusyReason::ExecutingCode => "executing code",
            BusyReason::InspectingVariables => "inspecting variables",
            BusyReason::ProvidingCodeCompletion => "providing code completion",
        };
        f.write_str(s)
    }
}

/// In-flight operation counts per [`BusyReason`].
///
/// Counts never go below zero: a completion that was never started (or
/// is reported twice) clamps rather than underflowing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusyCounters {
    pending: [usize; 3],
}

impl BusyCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, reason: BusyReason) -> usize {
        self.pending[reason.index()]
    }

    /// Record the start of an operation.
    pub fn begin(&mut self, reason: BusyReason) {
        self.pending[reason.index()] += 1;
    }

    /// Record the end of an operation, clamped at zero.
    pub fn end(&mut self, reason: BusyReason) {
        let slot = &mut self.pending[reason.index()];
        *slot = slot.saturating_sub(1);
    }

    /// Code completion is skipped while user code runs or variables are
    /// being inspected.
    pub fn is_too_busy_for_completion(&self) -> bool {
        self.pending(BusyReason::ExecutingCode) > 0
            || self.pending(BusyReason::InspectingVariables) > 0
    }

    pub fn is_idle(&self) -> bool {
        self.pending.iter().all(|&n| n == 0)
    }
}

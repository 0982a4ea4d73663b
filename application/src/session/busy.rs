//! Busy tracking around session requests.
//!
//! Every tracked call takes a [`BusyGuard`] before the kernel is contacted.
//! The guard decrements its counter when dropped, which covers success,
//! failure and cancellation of the caller alike. Executions outlive the call
//! that starts them, so their guard moves into the returned future's settle
//! hook instead.

use crate::kernel::KernelFuture;
use nbkernel_domain::{BusyCounters, BusyReason, KernelError};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// How a tracked call finishes.
pub enum Completion<'a> {
    /// Nothing is left running; release now.
    Immediate,
    /// Still running; release when this future settles.
    Deferred(&'a KernelFuture),
}

impl<'a> Completion<'a> {
    /// A call that produced no future (no kernel, or failed to send) is over.
    pub fn of(result: &'a Result<Option<KernelFuture>, KernelError>) -> Self {
        match result {
            Ok(Some(future)) => Completion::Deferred(future),
            _ => Completion::Immediate,
        }
    }
}

/// Shared in-flight counters for one session.
#[derive(Clone)]
pub struct BusyTracker {
    enabled: bool,
    counters: Arc<Mutex<BusyCounters>>,
}

/// Holds one unit of a [`BusyReason`] counter until dropped.
pub struct BusyGuard {
    counters: Arc<Mutex<BusyCounters>>,
    reason: BusyReason,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.end(self.reason);
        trace!(
            "Busy {}: {} pending",
            self.reason,
            counters.pending(self.reason)
        );
    }
}

impl BusyTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            counters: Arc::new(Mutex::new(BusyCounters::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusyCounters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn snapshot(&self) -> BusyCounters {
        self.lock().clone()
    }

    pub fn pending(&self, reason: BusyReason) -> usize {
        self.lock().pending(reason)
    }

    pub fn begin(&self, reason: BusyReason) -> BusyGuard {
        self.lock().begin(reason);
        BusyGuard {
            counters: Arc::clone(&self.counters),
            reason,
        }
    }

    /// Whether a completion request should be skipped right now.
    pub fn should_skip_completion(&self) -> bool {
        self.enabled && self.lock().is_too_busy_for_completion()
    }

    /// Count `op` under `reason` until it resolves or is dropped.
    pub async fn track<T>(&self, reason: BusyReason, op: impl Future<Output = T>) -> T {
        let _guard = self.begin(reason);
        op.await
    }

    /// Count an execution until the future it returns settles.
    pub fn track_execute(
        &self,
        op: impl FnOnce() -> Result<Option<KernelFuture>, KernelError>,
    ) -> Result<Option<KernelFuture>, KernelError> {
        let guard = self.begin(BusyReason::ExecutingCode);
        let result = op();
        match Completion::of(&result) {
            Completion::Immediate => drop(guard),
            Completion::Deferred(future) => future.on_settled(move |_| drop(guard)),
        }
        result
    }
}

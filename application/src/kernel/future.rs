//! Pending kernel requests.
//!
//! A [`KernelFuture`] is created for every request that expects traffic back
//! from the kernel. The kernel client feeds it every message whose
//! `parent_header.msg_id` matches the request; the future then
//!
//! - streams non-terminal messages (iopub output, stdin prompts) to its
//!   consumer in arrival order,
//! - settles `done` exactly once, on the terminal `*_reply` or, for requests
//!   that expect no reply, on the kernel returning to `idle`,
//! - rejects with [`KernelError::DisposedFuture`] when disposed while still
//!   pending.
//!
//! Once settled a future keeps streaming until it is disposed, so output that
//! trails the reply is not lost. With `dispose_on_done` the future disposes
//! itself after both the reply and the parent's `idle` status have been seen.

use nbkernel_domain::{JupyterMessage, KernelError, KernelStatus};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tracing::trace;

/// Result of a kernel request: the terminal message, or why there is none.
pub type FutureOutcome = Result<JupyterMessage, KernelError>;

type SettledHook = Box<dyn FnOnce(&FutureOutcome) + Send>;
type DisposeHook = Box<dyn FnOnce(&str) + Send>;

/// How a future decides it is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FutureOptions {
    /// Settle on a `*_reply`; otherwise settle on `idle`.
    pub expect_reply: bool,
    /// De-register automatically once finished.
    pub dispose_on_done: bool,
}

impl FutureOptions {
    /// A request answered by a reply, cleaned up automatically.
    pub fn request() -> Self {
        Self {
            expect_reply: true,
            dispose_on_done: true,
        }
    }

    /// A message that gets no reply; finished when the kernel goes idle.
    pub fn until_idle() -> Self {
        Self {
            expect_reply: false,
            dispose_on_done: true,
        }
    }

    pub fn keep_alive(mut self) -> Self {
        self.dispose_on_done = false;
        self
    }
}

/// Lifecycle of a [`KernelFuture`].
///
/// Transitions only move forward: `Pending -> Done -> Disposed` or
/// `Pending -> Disposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    Pending,
    Done,
    Disposed,
}

struct FutureCore {
    state: FutureState,
    stream_tx: Option<mpsc::UnboundedSender<JupyterMessage>>,
    stream_rx: Option<mpsc::UnboundedReceiver<JupyterMessage>>,
    settled_hooks: Vec<SettledHook>,
    on_dispose: Option<DisposeHook>,
    idle_seen: bool,
}

struct FutureInner {
    request: JupyterMessage,
    options: FutureOptions,
    core: Mutex<FutureCore>,
    outcome: watch::Sender<Option<FutureOutcome>>,
}

/// Handle to one in-flight request. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct KernelFuture {
    inner: Arc<FutureInner>,
}

impl fmt::Debug for KernelFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelFuture")
            .field("msg_id", &self.msg_id())
            .field("msg_type", &self.inner.request.msg_type())
            .field("state", &self.state())
            .finish()
    }
}

impl KernelFuture {
    /// Create a future for `request`.
    ///
    /// `on_dispose` runs exactly once, with the request's `msg_id`, when the
    /// future is disposed; the kernel client uses it to drop its routing entry.
    pub fn new(
        request: JupyterMessage,
        options: FutureOptions,
        on_dispose: impl FnOnce(&str) + Send + 'static,
    ) -> Self {
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let (outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(FutureInner {
                request,
                options,
                core: Mutex::new(FutureCore {
                    state: FutureState::Pending,
                    stream_tx: Some(stream_tx),
                    stream_rx: Some(stream_rx),
                    settled_hooks: Vec::new(),
                    on_dispose: Some(Box::new(on_dispose)),
                    idle_seen: false,
                }),
                outcome,
            }),
        }
    }

    /// A future nobody routes messages to; handy for adapters and tests.
    pub fn detached(request: JupyterMessage, options: FutureOptions) -> Self {
        Self::new(request, options, |_| {})
    }

    fn lock(&self) -> MutexGuard<'_, FutureCore> {
        self.inner.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The request this future belongs to.
    pub fn msg(&self) -> &JupyterMessage {
        &self.inner.request
    }

    pub fn msg_id(&self) -> &str {
        self.inner.request.msg_id()
    }

    pub fn options(&self) -> FutureOptions {
        self.inner.options
    }

    pub fn state(&self) -> FutureState {
        self.lock().state
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == FutureState::Disposed
    }

    /// Take the stream of non-terminal messages.
    ///
    /// Messages are buffered from creation, so nothing is missed between
    /// sending the request and taking the stream. Only the first call gets
    /// the stream. It ends when the future is disposed.
    pub fn take_messages(&self) -> Option<mpsc::UnboundedReceiver<JupyterMessage>> {
        self.lock().stream_rx.take()
    }

    /// The outcome, if the future has settled.
    pub fn outcome(&self) -> Option<FutureOutcome> {
        self.inner.outcome.borrow().clone()
    }

    /// Wait for the future to settle.
    pub async fn done(&self) -> FutureOutcome {
        let mut rx = self.inner.outcome.subscribe();
        let settled = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        settled.unwrap_or(Err(KernelError::DisposedFuture))
    }

    /// Run `hook` once the future settles, successfully or not.
    ///
    /// Runs immediately if it already has.
    pub fn on_settled(&self, hook: impl FnOnce(&FutureOutcome) + Send + 'static) {
        let outcome = {
            let mut core = self.lock();
            if core.state == FutureState::Pending {
                core.settled_hooks.push(Box::new(hook));
                return;
            }
            self.inner.outcome.borrow().clone()
        };
        hook(&outcome.unwrap_or(Err(KernelError::DisposedFuture)));
    }

    /// Feed a message correlated with this request.
    pub fn handle_message(&self, msg: JupyterMessage) {
        let options = self.inner.options;
        let is_idle = msg.execution_state() == Some(KernelStatus::Idle);

        let (hooks, dispose_now) = {
            let mut core = self.lock();
            if core.state == FutureState::Disposed {
                trace!(
                    "Future {}: dropping {} after dispose",
                    self.msg_id(),
                    msg.msg_type()
                );
                return;
            }
            if is_idle {
                core.idle_seen = true;
            }

            let mut settled: Option<FutureOutcome> = None;
            if msg.is_reply() && options.expect_reply {
                if core.state == FutureState::Pending {
                    settled = Some(Ok(msg));
                } else {
                    trace!(
                        "Future {}: ignoring duplicate {}",
                        self.msg_id(),
                        msg.msg_type()
                    );
                }
            } else {
                if let Some(tx) = &core.stream_tx {
                    let _ = tx.send(msg.clone());
                }
                if is_idle && !options.expect_reply && core.state == FutureState::Pending {
                    settled = Some(Ok(msg));
                }
            }

            let hooks = match settled {
                Some(outcome) => {
                    core.state = FutureState::Done;
                    self.inner.outcome.send_replace(Some(outcome.clone()));
                    Some((outcome, std::mem::take(&mut core.settled_hooks)))
                }
                None => None,
            };
            let dispose_now =
                options.dispose_on_done && core.state == FutureState::Done && core.idle_seen;
            (hooks, dispose_now)
        };

        if let Some((outcome, hooks)) = hooks {
            for hook in hooks {
                hook(&outcome);
            }
        }
        if dispose_now {
            self.dispose();
        }
    }

    /// Tear the future down. Idempotent.
    ///
    /// A pending future rejects with [`KernelError::DisposedFuture`]; the
    /// message stream ends and the dispose callback runs.
    pub fn dispose(&self) {
        let (hooks, on_dispose) = {
            let mut core = self.lock();
            if core.state == FutureState::Disposed {
                return;
            }
            let was_pending = core.state == FutureState::Pending;
            core.state = FutureState::Disposed;
            core.stream_tx = None;
            let hooks = if was_pending {
                self.inner
                    .outcome
                    .send_replace(Some(Err(KernelError::DisposedFuture)));
                std::mem::take(&mut core.settled_hooks)
            } else {
                Vec::new()
            };
            (hooks, core.on_dispose.take())
        };

        let outcome = Err(KernelError::DisposedFuture);
        for hook in hooks {
            hook(&outcome);
        }
        if let Some(callback) = on_dispose {
            callback(self.msg_id());
        }
    }
}

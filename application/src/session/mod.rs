//! The session façade.
//!
//! [`JupyterSession`] is what the notebook layer holds on to for the life of
//! a kernel binding. It owns exactly one [`KernelConnection`] at a time and
//! keeps its identity (and its subscribers) when that connection is replaced
//! by a restart or a kernel change.
//!
//! The externally visible [`SessionStatus`] is never stored: it is folded
//! from the connection's raw status on every read, and a forwarder task
//! re-publishes folded transitions to `on_status_changed` subscribers.
//!
//! Requests return `Ok(None)` while no kernel is attached; that is an
//! expected transient state. Once the session is shut down every operation
//! fails with [`KernelError::SessionDisposed`].

pub mod busy;
pub mod deadline;

pub use busy::{BusyGuard, BusyTracker, Completion};
pub use deadline::with_deadline;

use crate::config::SessionConfig;
use crate::events::EventEmitter;
use crate::kernel::KernelFuture;
use crate::ports::connection_factory::KernelConnectionFactory;
use crate::ports::kernel_connection::{KernelConnection, OutgoingComm};
use nbkernel_domain::{
    BusyReason, CompleteRequest, ExecuteRequest, InputReply, InspectRequest, JupyterMessage,
    KernelError, KernelSelection, SessionStatus,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Connection = Arc<dyn KernelConnection>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Publishes folded status transitions, suppressing repeats.
struct StatusPublisher {
    events: EventEmitter<SessionStatus>,
    last: Mutex<SessionStatus>,
}

impl StatusPublisher {
    fn publish(&self, status: SessionStatus) {
        let changed = {
            let mut last = lock(&self.last);
            if *last == status {
                false
            } else {
                *last = status;
                true
            }
        };
        if changed {
            debug!("Session status: {}", status);
            self.events.fire(status);
        }
    }
}

/// A notebook's binding to a kernel.
pub struct JupyterSession {
    factory: Arc<dyn KernelConnectionFactory>,
    config: SessionConfig,
    connection: RwLock<Option<Connection>>,
    selection: Mutex<Option<KernelSelection>>,
    connected: AtomicBool,
    disposed: AtomicBool,
    busy: BusyTracker,
    publisher: Arc<StatusPublisher>,
    kernel_changed: EventEmitter<String>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl JupyterSession {
    pub fn new(factory: Arc<dyn KernelConnectionFactory>, config: SessionConfig) -> Self {
        let busy = BusyTracker::new(config.busy_tracking);
        Self {
            factory,
            config,
            connection: RwLock::new(None),
            selection: Mutex::new(None),
            connected: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            busy,
            publisher: Arc::new(StatusPublisher {
                events: EventEmitter::new(),
                last: Mutex::new(SessionStatus::NotStarted),
            }),
            kernel_changed: EventEmitter::new(),
            forwarder: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current status, folded from the attached connection.
    pub fn status(&self) -> SessionStatus {
        let connection = self.connection.read().unwrap_or_else(|e| e.into_inner());
        SessionStatus::fold_optional(connection.as_ref().map(|c| c.status()).as_ref())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn busy(&self) -> &BusyTracker {
        &self.busy
    }

    /// The attached connection, if any.
    pub fn kernel(&self) -> Option<Arc<dyn KernelConnection>> {
        self.connection
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn selection(&self) -> Option<KernelSelection> {
        lock(&self.selection).clone()
    }

    /// Status transitions from now on. Nothing is replayed.
    pub fn on_status_changed(&self) -> mpsc::UnboundedReceiver<SessionStatus> {
        self.publisher.events.subscribe()
    }

    /// Id of each newly attached kernel. Comm targets and iopub
    /// subscriptions belong to a connection and must be renewed on change.
    pub fn on_kernel_changed(&self) -> mpsc::UnboundedReceiver<String> {
        self.kernel_changed.subscribe()
    }

    fn ensure_live(&self) -> Result<(), KernelError> {
        if self.is_disposed() {
            Err(KernelError::SessionDisposed)
        } else {
            Ok(())
        }
    }

    /// Attach `connection`, disposing whatever was attached before.
    fn install(&self, connection: Connection) {
        let mut changes = connection.status_changed();
        let publisher = Arc::clone(&self.publisher);
        let forwarder = tokio::spawn(async move {
            while let Some(raw) = changes.recv().await {
                publisher.publish(SessionStatus::fold(&raw));
            }
        });

        let kernel_id = connection.id().to_string();
        {
            let mut current = self.connection.write().unwrap_or_else(|e| e.into_inner());
            if let Some(old) = current.take()
                && !Arc::ptr_eq(&old, &connection)
            {
                debug!("Disposing previous kernel connection {}", old.id());
                old.dispose();
            }
            *current = Some(connection);
        }
        if let Some(previous) = lock(&self.forwarder).replace(forwarder) {
            previous.abort();
        }

        self.connected.store(true, Ordering::SeqCst);
        self.publisher.publish(self.status());
        self.kernel_changed.fire(kernel_id);
    }

    /// Connect to the selected kernel.
    ///
    /// On failure the session stays `NotStarted`.
    pub async fn connect(&self, selection: KernelSelection) -> Result<(), KernelError> {
        self.ensure_live()?;
        info!("Connecting session to {}", selection.display_name());
        let connection = self.factory.connect(&selection).await?;
        if self.is_disposed() {
            connection.dispose();
            return Err(KernelError::SessionDisposed);
        }
        *lock(&self.selection) = Some(selection);
        self.install(connection);
        Ok(())
    }

    /// Switch to a different kernel and wait for it to become idle.
    pub async fn change_kernel(
        &self,
        selection: KernelSelection,
        timeout: Duration,
    ) -> Result<(), KernelError> {
        self.ensure_live()?;
        info!("Changing session kernel to {}", selection.display_name());
        with_deadline("change_kernel", timeout, async {
            let connection = self.factory.connect(&selection).await?;
            if self.is_disposed() {
                connection.dispose();
                return Err(KernelError::SessionDisposed);
            }
            *lock(&self.selection) = Some(selection.clone());
            self.install(connection);
            self.idle().await
        })
        .await
    }

    /// Restart the kernel and wait for it to become idle.
    pub async fn restart(&self, timeout: Duration) -> Result<(), KernelError> {
        self.ensure_live()?;
        let current = self.kernel().ok_or(KernelError::Disconnected)?;
        let selection = self.selection().ok_or(KernelError::Disconnected)?;
        info!("Restarting kernel {}", current.id());
        with_deadline("restart", timeout, async {
            let restarted = self.factory.restart(current, &selection).await?;
            self.install(restarted);
            self.idle().await
        })
        .await
    }

    /// Interrupt the running kernel.
    ///
    /// Fails with `KernelPromiseTimeout` if the kernel does not acknowledge
    /// within `timeout`; an explicit refusal surfaces as the kernel's error.
    pub async fn interrupt(&self, timeout: Duration) -> Result<(), KernelError> {
        self.ensure_live()?;
        let Some(connection) = self.kernel() else {
            return Ok(());
        };
        info!("Interrupting kernel {}", connection.id());
        with_deadline("interrupt", timeout, connection.interrupt()).await
    }

    /// Interrupt with the configured deadline, restarting the kernel when
    /// the interrupt goes unacknowledged.
    ///
    /// Returns `true` if the kernel was restarted. A restart tears down the
    /// connection, so in-flight requests end with `DisposedFuture`.
    pub async fn interrupt_or_restart(&self) -> Result<bool, KernelError> {
        match self.interrupt(self.config.interrupt_timeout).await {
            Ok(()) => Ok(false),
            Err(e) if e.is_timeout() => {
                warn!("{}; restarting kernel", e);
                self.restart(self.config.restart_timeout).await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Wait until the kernel reports `idle`.
    pub async fn wait_for_idle(&self, timeout: Duration) -> Result<(), KernelError> {
        self.ensure_live()?;
        with_deadline("wait_for_idle", timeout, self.idle()).await
    }

    async fn idle(&self) -> Result<(), KernelError> {
        let mut events = self.on_status_changed();
        let connection = self.kernel().ok_or(KernelError::Disconnected)?;

        // A kernel_info round trip makes a quiet kernel publish its status.
        let mut probe = connection.request_kernel_info();
        let mut probing = true;
        loop {
            match self.status() {
                SessionStatus::Idle => return Ok(()),
                SessionStatus::Dead => return Err(KernelError::Disconnected),
                _ => {}
            }
            tokio::select! {
                event = events.recv() => match event {
                    Some(SessionStatus::Idle) => return Ok(()),
                    Some(SessionStatus::Dead) | None => return Err(KernelError::Disconnected),
                    Some(_) => {}
                },
                result = &mut probe, if probing => {
                    probing = false;
                    if let Err(e) = result {
                        debug!("kernel_info probe failed: {}", e);
                    }
                }
            }
        }
    }

    /// Shut the kernel down and release the connection.
    ///
    /// A kernel that does not answer within the configured shutdown timeout
    /// is torn down anyway. Afterwards every operation fails with
    /// [`KernelError::SessionDisposed`].
    pub async fn shutdown(&self) -> Result<(), KernelError> {
        if let Some(connection) = self.release()? {
            info!("Shutting down kernel {}", connection.id());
            if let Err(e) = with_deadline(
                "shutdown",
                self.config.shutdown_timeout,
                connection.shutdown(),
            )
            .await
            {
                warn!("Kernel {} did not shut down cleanly: {}", connection.id(), e);
            }
            connection.dispose();
        }
        self.publisher.publish(SessionStatus::NotStarted);
        Ok(())
    }

    /// Release the connection without asking the kernel to shut down.
    ///
    /// For kernels the session attached to but does not own. The session is
    /// disposed afterwards, exactly as after [`shutdown`](Self::shutdown).
    pub fn detach(&self) -> Result<(), KernelError> {
        if let Some(connection) = self.release()? {
            info!("Detaching from kernel {}", connection.id());
            connection.dispose();
        }
        self.publisher.publish(SessionStatus::NotStarted);
        Ok(())
    }

    /// Mark the session disposed and take its connection.
    fn release(&self) -> Result<Option<Connection>, KernelError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(KernelError::SessionDisposed);
        }
        let connection = self
            .connection
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(forwarder) = lock(&self.forwarder).take() {
            forwarder.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(connection)
    }

    /// Idempotent teardown.
    pub async fn dispose(&self) {
        if let Err(e) = self.shutdown().await
            && e != KernelError::SessionDisposed
        {
            debug!("Session dispose: {}", e);
        }
    }

    // ==================== Requests ====================

    pub fn request_execute(
        &self,
        content: ExecuteRequest,
        dispose_on_done: bool,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Option<KernelFuture>, KernelError> {
        self.ensure_live()?;
        let connection = self.kernel();
        self.busy.track_execute(|| match connection {
            Some(connection) => connection
                .request_execute(content, dispose_on_done, metadata)
                .map(Some),
            None => Ok(None),
        })
    }

    pub async fn request_inspect(
        &self,
        content: InspectRequest,
    ) -> Result<Option<JupyterMessage>, KernelError> {
        self.ensure_live()?;
        let Some(connection) = self.kernel() else {
            return Ok(None);
        };
        self.busy
            .track(
                BusyReason::InspectingVariables,
                connection.request_inspect(content),
            )
            .await
            .map(Some)
    }

    /// Request completions, unless code is running or variables are being
    /// inspected, in which case the kernel is not contacted at all.
    pub async fn request_complete(
        &self,
        content: CompleteRequest,
    ) -> Result<Option<JupyterMessage>, KernelError> {
        self.ensure_live()?;
        let Some(connection) = self.kernel() else {
            return Ok(None);
        };
        if self.busy.should_skip_completion() {
            debug!("Skipping completion: kernel is busy");
            return Ok(None);
        }
        self.busy
            .track(
                BusyReason::ProvidingCodeCompletion,
                connection.request_complete(content),
            )
            .await
            .map(Some)
    }

    pub async fn request_kernel_info(&self) -> Result<Option<JupyterMessage>, KernelError> {
        self.ensure_live()?;
        match self.kernel() {
            Some(connection) => connection.request_kernel_info().await.map(Some),
            None => Ok(None),
        }
    }

    pub fn send_input_reply(&self, content: InputReply) -> Result<(), KernelError> {
        self.ensure_live()?;
        match self.kernel() {
            Some(connection) => connection.send_input_reply(content),
            None => Ok(()),
        }
    }

    pub fn iopub_messages(
        &self,
    ) -> Result<Option<mpsc::UnboundedReceiver<JupyterMessage>>, KernelError> {
        self.ensure_live()?;
        Ok(self.kernel().map(|c| c.iopub_messages()))
    }

    pub fn register_comm_target(
        &self,
        target_name: &str,
    ) -> Result<Option<mpsc::UnboundedReceiver<JupyterMessage>>, KernelError> {
        self.ensure_live()?;
        Ok(self.kernel().map(|c| c.register_comm_target(target_name)))
    }

    pub fn remove_comm_target(&self, target_name: &str) {
        if let Some(connection) = self.kernel() {
            connection.remove_comm_target(target_name);
        }
    }

    pub fn send_comm_message(
        &self,
        message: OutgoingComm,
    ) -> Result<Option<KernelFuture>, KernelError> {
        self.ensure_live()?;
        match self.kernel() {
            Some(connection) => connection.send_comm_message(message).map(Some),
            None => Ok(None),
        }
    }
}

impl Drop for JupyterSession {
    fn drop(&mut self) {
        if let Some(forwarder) = lock(&self.forwarder).take() {
            forwarder.abort();
        }
        if let Some(connection) = self
            .connection
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            connection.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::FutureState;
    use crate::ports::transport::Transport;
    use crate::test_support::{FakeFactory, flush, kernel_status, reply_to, selection, status};
    use nbkernel_domain::KernelStatus;
    use serde_json::json;

    fn session_with(factory: &Arc<FakeFactory>) -> Arc<JupyterSession> {
        Arc::new(JupyterSession::new(
            factory.clone(),
            SessionConfig::default().with_shutdown_timeout(Duration::from_millis(200)),
        ))
    }

    async fn connected() -> (Arc<JupyterSession>, Arc<FakeFactory>) {
        let factory = Arc::new(FakeFactory::default());
        let session = session_with(&factory);
        session.connect(selection()).await.unwrap();
        (session, factory)
    }

    fn complete_request() -> CompleteRequest {
        CompleteRequest {
            code: "pri".to_string(),
            cursor_pos: 3,
        }
    }

    fn inspect_request() -> InspectRequest {
        InspectRequest {
            code: "x".to_string(),
            cursor_pos: 1,
            detail_level: 0,
        }
    }

    #[tokio::test]
    async fn without_kernel_requests_yield_nothing() {
        let factory = Arc::new(FakeFactory::default());
        let session = session_with(&factory);

        assert_eq!(session.status(), SessionStatus::NotStarted);
        assert!(!session.is_connected());
        assert!(
            session
                .request_execute(ExecuteRequest::new("1"), true, None)
                .unwrap()
                .is_none()
        );
        assert!(session.request_complete(complete_request()).await.unwrap().is_none());
        assert!(session.request_inspect(inspect_request()).await.unwrap().is_none());
        session.send_input_reply(InputReply::ok("x")).unwrap();
        session.interrupt(Duration::from_secs(1)).await.unwrap();
        assert!(session.busy().snapshot().is_idle());
    }

    #[tokio::test]
    async fn failed_connect_stays_not_started() {
        let factory = Arc::new(FakeFactory::default());
        factory.refuse_connections();
        let session = session_with(&factory);

        let err = session.connect(selection()).await.unwrap_err();
        assert!(matches!(err, KernelError::Connection(_)));
        assert_eq!(session.status(), SessionStatus::NotStarted);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn status_is_folded_from_the_connection() {
        let (session, factory) = connected().await;
        assert!(session.is_connected());
        assert_eq!(session.kernel().unwrap().status(), KernelStatus::Unknown);
        assert_eq!(session.status(), SessionStatus::NotStarted);

        let mut first = session.on_status_changed();
        let mut second = session.on_status_changed();
        let transport = factory.latest_transport();
        transport.push(kernel_status("starting"));
        transport.push(kernel_status("busy"));
        transport.push(kernel_status("autorestarting"));

        for stream in [&mut first, &mut second] {
            assert_eq!(stream.recv().await, Some(SessionStatus::Starting));
            assert_eq!(stream.recv().await, Some(SessionStatus::Busy));
            assert_eq!(stream.recv().await, Some(SessionStatus::Restarting));
        }
        assert_eq!(session.status(), SessionStatus::Restarting);
    }

    #[tokio::test]
    async fn late_subscribers_get_no_replay() {
        let (session, factory) = connected().await;
        let mut early = session.on_status_changed();
        factory.latest_transport().push(kernel_status("busy"));
        assert_eq!(early.recv().await, Some(SessionStatus::Busy));

        let mut late = session.on_status_changed();
        factory.latest_transport().push(kernel_status("idle"));
        assert_eq!(late.recv().await, Some(SessionStatus::Idle));
    }

    #[tokio::test]
    async fn completion_is_skipped_while_code_runs() {
        let (session, factory) = connected().await;
        let transport = factory.latest_transport();
        let execution = session
            .request_execute(ExecuteRequest::new("import time; time.sleep(10)"), true, None)
            .unwrap()
            .unwrap();
        assert_eq!(session.busy().pending(BusyReason::ExecutingCode), 1);

        let skipped = session.request_complete(complete_request()).await.unwrap();
        assert!(skipped.is_none());
        assert!(transport.sent_of_type("complete_request").is_empty());

        transport.push(reply_to(
            execution.msg(),
            "execute_reply",
            json!({"status": "error", "ename": "KeyboardInterrupt", "evalue": ""}),
        ));
        execution.done().await.unwrap();
        assert_eq!(session.busy().pending(BusyReason::ExecutingCode), 0);

        let pending = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.request_complete(complete_request()).await })
        };
        flush().await;
        let request = transport.last_sent();
        assert_eq!(request.msg_type(), "complete_request");
        transport.push(reply_to(&request, "complete_reply", json!({"status": "ok", "matches": ["print"]})));

        let reply = pending.await.unwrap().unwrap().unwrap();
        assert_eq!(reply.content["matches"], json!(["print"]));
        assert!(session.busy().snapshot().is_idle());
    }

    #[tokio::test]
    async fn rejected_execution_unblocks_completion() {
        let (session, _factory) = connected().await;
        let execution = session
            .request_execute(ExecuteRequest::new("1"), true, None)
            .unwrap()
            .unwrap();
        execution.dispose();
        assert!(!session.busy().should_skip_completion());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_interrupt_times_out_and_leaves_execution_pending() {
        let (session, factory) = connected().await;
        let execution = session
            .request_execute(ExecuteRequest::new("print(1)"), true, None)
            .unwrap()
            .unwrap();

        let err = session
            .interrupt(Duration::from_millis(5000))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            KernelError::KernelPromiseTimeout {
                operation: "interrupt",
                timeout_ms: 5000,
            }
        );
        assert_eq!(execution.state(), FutureState::Pending);
        assert_eq!(
            factory.latest_transport().sent_of_type("interrupt_request").len(),
            1
        );
    }

    #[tokio::test]
    async fn acknowledged_interrupt_succeeds() {
        let (session, factory) = connected().await;
        let transport = factory.latest_transport();
        let pending = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.interrupt(Duration::from_secs(5)).await })
        };
        flush().await;
        let request = transport.last_sent();
        transport.push(reply_to(&request, "interrupt_reply", json!({"status": "ok"})));
        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn acknowledged_interrupt_does_not_restart() {
        let (session, factory) = connected().await;
        let transport = factory.latest_transport();
        let pending = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.interrupt_or_restart().await })
        };
        flush().await;
        let request = transport.last_sent();
        transport.push(reply_to(&request, "interrupt_reply", json!({"status": "ok"})));

        assert_eq!(pending.await.unwrap(), Ok(false));
        assert_eq!(factory.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_interrupt_restarts_within_configured_deadline() {
        let factory = Arc::new(FakeFactory::default());
        let session = Arc::new(JupyterSession::new(
            factory.clone(),
            SessionConfig::default()
                .with_interrupt_timeout(Duration::from_millis(300))
                .with_restart_timeout(Duration::from_millis(700)),
        ));
        session.connect(selection()).await.unwrap();
        let execution = session
            .request_execute(ExecuteRequest::new("while True: pass"), true, None)
            .unwrap()
            .unwrap();

        // The restarted kernel never reports idle.
        let err = session.interrupt_or_restart().await.unwrap_err();

        assert_eq!(
            err,
            KernelError::KernelPromiseTimeout {
                operation: "restart",
                timeout_ms: 700,
            }
        );
        assert!(factory.transport(0).is_disposed());
        assert_eq!(factory.connect_count(), 2);
        assert_eq!(execution.state(), FutureState::Disposed);
    }

    #[tokio::test]
    async fn kernel_death_rejects_in_flight_requests() {
        let (session, factory) = connected().await;
        let transport = factory.latest_transport();

        let complete = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.request_complete(complete_request()).await })
        };
        flush().await;
        let inspect = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.request_inspect(inspect_request()).await })
        };
        flush().await;
        assert_eq!(transport.sent().len(), 2);

        transport.push(kernel_status("dead"));

        assert_eq!(complete.await.unwrap(), Err(KernelError::DisposedFuture));
        assert_eq!(inspect.await.unwrap(), Err(KernelError::DisposedFuture));
        assert_eq!(session.status(), SessionStatus::Dead);
        assert!(session.busy().snapshot().is_idle());
    }

    #[tokio::test]
    async fn wait_for_idle_probes_quiet_kernels() {
        let (session, factory) = connected().await;
        let transport = factory.latest_transport();
        let pending = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.wait_for_idle(Duration::from_secs(5)).await })
        };
        flush().await;
        let probe = transport.last_sent();
        assert_eq!(probe.msg_type(), "kernel_info_request");

        transport.push(status(&probe, "busy"));
        transport.push(reply_to(&probe, "kernel_info_reply", json!({"status": "ok"})));
        transport.push(status(&probe, "idle"));
        pending.await.unwrap().unwrap();
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_idle_times_out() {
        let (session, _factory) = connected().await;
        let err = session
            .wait_for_idle(Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn wait_for_idle_without_kernel_fails() {
        let factory = Arc::new(FakeFactory::default());
        let session = session_with(&factory);
        assert_eq!(
            session.wait_for_idle(Duration::from_secs(1)).await,
            Err(KernelError::Disconnected)
        );
    }

    #[tokio::test]
    async fn change_kernel_replaces_and_disposes_old_connection() {
        let (session, factory) = connected().await;
        let old_transport = factory.transport(0);
        let mut changes = session.on_status_changed();
        let mut kernels = session.on_kernel_changed();

        let pending = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session
                    .change_kernel(selection(), Duration::from_secs(5))
                    .await
            })
        };
        flush().await;
        assert!(old_transport.is_disposed());
        assert_eq!(factory.connect_count(), 2);

        factory.latest_transport().push(kernel_status("idle"));
        pending.await.unwrap().unwrap();

        assert_eq!(changes.recv().await, Some(SessionStatus::Idle));
        assert!(kernels.recv().await.is_some());
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn restart_goes_through_the_factory() {
        let (session, factory) = connected().await;
        let before = session.kernel().unwrap().id().to_string();

        let pending = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.restart(Duration::from_secs(5)).await })
        };
        flush().await;
        assert!(factory.transport(0).is_disposed());
        factory.latest_transport().push(kernel_status("idle"));
        pending.await.unwrap().unwrap();

        assert_ne!(session.kernel().unwrap().id(), before);
    }

    #[tokio::test]
    async fn restart_without_kernel_fails() {
        let factory = Arc::new(FakeFactory::default());
        let session = session_with(&factory);
        assert_eq!(
            session.restart(Duration::from_secs(1)).await,
            Err(KernelError::Disconnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_connection_and_disables_session() {
        let (session, factory) = connected().await;
        let transport = factory.latest_transport();
        factory.latest_transport().push(kernel_status("idle"));
        flush().await;
        let mut changes = session.on_status_changed();

        session.shutdown().await.unwrap();

        assert_eq!(transport.sent_of_type("shutdown_request").len(), 1);
        assert!(transport.is_disposed());
        assert!(session.kernel().is_none());
        assert_eq!(session.status(), SessionStatus::NotStarted);
        assert_eq!(changes.recv().await, Some(SessionStatus::NotStarted));
        assert_eq!(
            session
                .request_execute(ExecuteRequest::new("1"), true, None)
                .unwrap_err(),
            KernelError::SessionDisposed
        );
        assert_eq!(
            session.connect(selection()).await,
            Err(KernelError::SessionDisposed)
        );
        assert_eq!(session.shutdown().await, Err(KernelError::SessionDisposed));
        session.dispose().await;
    }

    #[tokio::test]
    async fn detach_leaves_the_kernel_running() {
        let (session, factory) = connected().await;
        let transport = factory.latest_transport();

        session.detach().unwrap();

        assert!(transport.sent_of_type("shutdown_request").is_empty());
        assert!(transport.is_disposed());
        assert!(session.kernel().is_none());
        assert_eq!(session.detach(), Err(KernelError::SessionDisposed));
        assert_eq!(session.shutdown().await, Err(KernelError::SessionDisposed));
    }
}

// ── Session controller ──
//
// Top-level owner of one session: the request client, the push socket,
// and the notification reconciler. Both ways a session can die (a 401 on
// any call, or the socket closing with the rejection code) funnel into
// `end_session`, so the two layers never disagree about being logged in.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use school_api::{
    ApiClient, ConnectionManager, ConnectionState, Identity, Method, Payload, SessionStatus,
    SessionStore, Subscription,
};

use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::model::{NotificationId, parse_snapshot};
use crate::reconciler::{NotificationReconciler, NotificationSnapshot};
use crate::stream::NotificationStream;

// ── SessionState ─────────────────────────────────────────────────

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Explicit logout.
    LoggedOut,
    /// A request came back 401.
    Expired,
    /// The socket was closed with the rejection code.
    Rejected { code: u16, reason: String },
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::Expired => write!(f, "session expired"),
            Self::Rejected { code, reason } if reason.is_empty() => {
                write!(f, "rejected by server (close code {code})")
            }
            Self::Rejected { code, reason } => {
                write!(f, "rejected by server (close code {code}): {reason}")
            }
        }
    }
}

/// Session lifecycle observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Active(Identity),
    Ended(EndReason),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

// ── SessionController ────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Exactly one request
/// client and one push socket exist per controller.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: SessionConfig,
    client: ApiClient,
    connection: ConnectionManager,
    reconciler: NotificationReconciler,
    state: watch::Sender<SessionState>,
    tasks: Mutex<SessionTasks>,
}

/// Background tasks of the current session.
#[derive(Default)]
struct SessionTasks {
    cancel: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
}

impl ControllerInner {
    fn tasks(&self) -> MutexGuard<'_, SessionTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the current session's tasks and hand back their handles.
    fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = self.tasks();
        if let Some(cancel) = tasks.cancel.take() {
            cancel.cancel();
        }
        std::mem::take(&mut tasks.handles)
    }

    /// Single teardown path. Returns `true` only for the call that ended
    /// an active session.
    fn end_session(&self, reason: EndReason) -> bool {
        let ended = self.state.send_if_modified(|state| {
            if !state.is_active() {
                return false;
            }
            // Teardown runs before observers see `Ended`.
            drop(self.take_tasks());
            self.connection.disconnect();
            self.reconciler.clear();
            if reason != EndReason::LoggedOut {
                self.client.invalidate_session();
            }
            *state = SessionState::Ended(reason.clone());
            true
        });
        if ended {
            info!(%reason, "session ended");
        }
        ended
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(cancel) = tasks.cancel.take() {
            cancel.cancel();
        }
    }
}

impl SessionController {
    /// Create a controller from configuration. Does NOT log in -- call
    /// [`login()`](Self::login) or [`resume()`](Self::resume).
    pub fn new(config: SessionConfig, store: Arc<dyn SessionStore>) -> Result<Self, CoreError> {
        let client = ApiClient::new(config.server.clone(), &config.transport, store)?;
        Ok(Self::with_client(config, client))
    }

    /// Create a controller around an existing request client.
    pub fn with_client(config: SessionConfig, client: ApiClient) -> Self {
        let connection = ConnectionManager::new(config.ws_url.clone(), config.reconnect.clone());
        let (state, _) = watch::channel(SessionState::Anonymous);

        Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                connection,
                reconciler: NotificationReconciler::new(),
                state,
                tasks: Mutex::new(SessionTasks::default()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The request client owned by this controller.
    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    // ── Session lifecycle ────────────────────────────────────────

    /// Log in, then start the session: open the push socket and load the
    /// notification snapshot.
    ///
    /// If the snapshot cannot be loaded the error is returned and the
    /// controller detaches as in [`close`](Self::close); the stored
    /// credential is kept.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Identity, CoreError> {
        let identity = self.inner.client.login(email, password).await?;
        self.start_session(identity.clone()).await?;
        Ok(identity)
    }

    /// Start a session from the stored credential, without a login.
    ///
    /// Returns `Ok(None)` when nothing is stored, and `SessionExpired` when
    /// the stored credential turns out to be rejected. Other snapshot
    /// failures are returned as-is after detaching.
    pub async fn resume(&self) -> Result<Option<Identity>, CoreError> {
        let Some(identity) = self.inner.client.resume()? else {
            return Ok(None);
        };
        self.start_session(identity.clone()).await?;
        Ok(Some(identity))
    }

    /// End the session deliberately: close the socket (no reconnect),
    /// drop notifications, and discard the stored credential.
    pub async fn logout(&self) -> Result<(), CoreError> {
        let handles = self.inner.take_tasks();
        self.inner.end_session(EndReason::LoggedOut);
        let result = self.inner.client.logout();

        for handle in handles {
            let _ = handle.await;
        }
        result.map_err(CoreError::from)
    }

    /// Detach without ending the session: stop background tasks and close
    /// the socket, keeping the credential so a later `resume()` continues.
    pub async fn close(&self) {
        let handles = self.inner.take_tasks();
        self.inner.connection.disconnect();
        self.inner.state.send_if_modified(|state| {
            if !state.is_active() {
                return false;
            }
            *state = SessionState::Anonymous;
            true
        });

        for handle in handles {
            let _ = handle.await;
        }
        debug!("session detached");
    }

    /// Current identity, if a session is held.
    pub fn identity(&self) -> Option<Identity> {
        self.inner.client.identity()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to session state changes.
    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to push socket state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state_changes()
    }

    // ── Requests ─────────────────────────────────────────────────

    /// Perform one resource call. A 401 ends the session.
    pub async fn call(
        &self,
        resource: &str,
        method: Method,
        payload: Payload,
    ) -> Result<Value, CoreError> {
        match self.inner.client.call(resource, method, payload).await {
            Ok(value) => Ok(value),
            Err(school_api::Error::SessionExpired) => {
                // A late 401 from a superseded session leaves the client
                // authenticated; only the current one is torn down.
                if !self.inner.client.is_authenticated() {
                    self.inner.end_session(EndReason::Expired);
                }
                Err(CoreError::SessionExpired)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Transmit a frame on the push socket. Returns `false` if it was
    /// discarded because the socket is not open.
    pub fn send(&self, message: &Value) -> bool {
        self.inner.connection.send(message)
    }

    // ── Notifications ────────────────────────────────────────────

    /// Fetch the notification snapshot and replace the collection with it.
    /// Returns the number of notifications loaded.
    pub async fn refresh_notifications(&self) -> Result<usize, CoreError> {
        let identity = self.identity().ok_or(CoreError::NotLoggedIn)?;
        let resource = self.inner.config.notifications_resource_for(identity.role);

        let body = self.call(&resource, Method::GET, Payload::Empty).await?;
        if !self.inner.state.borrow().is_active() {
            // Session ended while the fetch was in flight.
            return Err(CoreError::NotLoggedIn);
        }
        let notifications =
            parse_snapshot(&body).map_err(|message| CoreError::InvalidResponse { message })?;

        let count = notifications.len();
        self.inner.reconciler.initialize(notifications);
        debug!(count, resource = %resource, "notifications refreshed");
        Ok(count)
    }

    pub fn notifications(&self) -> NotificationSnapshot {
        self.inner.reconciler.snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.reconciler.unread_count()
    }

    /// Subscribe to notification collection changes.
    pub fn subscribe_notifications(&self) -> NotificationStream {
        self.inner.reconciler.subscribe()
    }

    /// Mark one notification read.
    ///
    /// The local flip always happens first (unknown ids are a no-op). With
    /// read-state sync enabled the server is told as well; its failure is
    /// returned but does not undo the local change.
    pub async fn mark_read(&self, id: &NotificationId) -> Result<bool, CoreError> {
        let changed = self.inner.reconciler.mark_read(id);
        if self.inner.config.sync_read_state && self.inner.client.is_authenticated() {
            self.call(
                &format!("notifications/{id}/read"),
                Method::PATCH,
                Payload::Empty,
            )
            .await?;
        }
        Ok(changed)
    }

    /// Mark every notification read. Returns how many flipped locally.
    pub async fn mark_all_read(&self) -> Result<usize, CoreError> {
        let flipped = self.inner.reconciler.mark_all_read();
        if self.inner.config.sync_read_state && self.inner.client.is_authenticated() {
            self.call("notifications/mark-all-read", Method::POST, Payload::Empty)
                .await?;
        }
        Ok(flipped)
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Wire up a freshly installed session.
    ///
    /// The socket subscription is registered before the socket opens, and
    /// the pump that feeds the reconciler starts only after the snapshot is
    /// applied. Frames arriving in between wait in the subscription queue,
    /// so none are overwritten by the snapshot.
    async fn start_session(&self, identity: Identity) -> Result<(), CoreError> {
        let credential = self
            .inner
            .client
            .credential()
            .ok_or(CoreError::NotLoggedIn)?;

        drop(self.inner.take_tasks());
        self.inner.reconciler.clear();
        self.inner
            .state
            .send_replace(SessionState::Active(identity.clone()));

        let cancel = CancellationToken::new();
        let subscription = self.inner.connection.subscribe();
        let watcher = tokio::spawn(watch_session(
            Arc::downgrade(&self.inner),
            self.inner.client.session_events(),
            self.inner.connection.state_changes(),
            cancel.clone(),
        ));
        {
            let mut tasks = self.inner.tasks();
            tasks.cancel = Some(cancel.clone());
            tasks.handles.push(watcher);
        }

        self.inner.connection.connect(&credential);

        if let Err(e) = self.refresh_notifications().await {
            // A rejected credential has already ended the session. Any other
            // failure detaches, keeping the credential for a later resume.
            if !e.requires_login() {
                warn!(error = %e, "could not load notification snapshot");
                self.close().await;
            }
            return Err(e);
        }

        let pump = tokio::spawn(pump_notifications(
            Arc::downgrade(&self.inner),
            subscription,
            cancel,
        ));
        self.inner.tasks().handles.push(pump);

        info!(user = %identity.email, role = %identity.role, "session started");
        Ok(())
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Relay socket frames into the reconciler.
async fn pump_notifications(
    inner: Weak<ControllerInner>,
    mut subscription: Subscription,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = subscription.recv() => {
                let (Some(frame), Some(inner)) = (frame, inner.upgrade()) else {
                    break;
                };
                inner.reconciler.apply_message(&frame);
            }
        }
    }
    debug!("notification pump stopped");
}

/// Watch both layers for a dead session and funnel it into `end_session`.
async fn watch_session(
    inner: Weak<ControllerInner>,
    mut session_rx: watch::Receiver<SessionStatus>,
    mut connection_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    loop {
        let reason = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = session_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = session_rx.borrow_and_update().clone();
                if status != SessionStatus::Expired {
                    continue;
                }
                EndReason::Expired
            }
            changed = connection_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connection_rx.borrow_and_update();
                if !state.is_terminal() {
                    continue;
                }
                let Some(inner) = inner.upgrade() else { break };
                match inner.connection.rejection() {
                    Some(school_api::Error::SessionRejected { code, reason }) => {
                        EndReason::Rejected { code, reason }
                    }
                    _ => EndReason::Rejected {
                        code: inner.config.reconnect.rejection_close_code,
                        reason: String::new(),
                    },
                }
            }
        };

        if let Some(inner) = inner.upgrade() {
            inner.end_session(reason);
        }
        break;
    }
    debug!("session watcher stopped");
}

//! Session manager: the public handle over one logical feed session.
//!
//! A [`SessionManager`] owns every piece of session state (status,
//! handshake flag, event log, subscribers) and hands out read-only views.
//! All transitions and all ingestion happen on a single driver task (see
//! [`super::driver`]); the handle only talks to it through channels.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::driver;
use super::subscribers::SubscriberRegistry;
use super::transport::{Connector, WsConnector};
use crate::config::{SessionOptions, validate_endpoint};
use crate::domain::{
    ChatMessage, CloseReason, ConnectionState, Event, EventBus, EventLog, Identity,
    SessionStatus, SubscriptionId,
};
use crate::error::SessionError;

/// A serialized payload waiting for the driver to write it.
#[derive(Debug)]
pub(super) struct OutboundRequest {
    pub(super) text: String,
    pub(super) reply: oneshot::Sender<Result<(), SessionError>>,
}

/// State shared between the handle and the driver task.
pub(super) struct Shared<C: Connector> {
    pub(super) options: SessionOptions,
    pub(super) connector: C,
    pub(super) status: watch::Sender<SessionStatus>,
    pub(super) shutdown: watch::Sender<bool>,
    pub(super) handshake_sent: AtomicBool,
    pub(super) log: EventLog,
    pub(super) bus: EventBus,
    pub(super) subscribers: SubscriberRegistry,
    outbound_tx: mpsc::UnboundedSender<OutboundRequest>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<OutboundRequest>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Connector> Shared<C> {
    /// Publishes a non-terminal state. Ignored once the session is closed.
    pub(super) fn set_state(&self, state: ConnectionState, reconnect_attempts: u32) {
        let changed = self.status.send_if_modified(|status| {
            if status.is_terminal() {
                return false;
            }
            *status = SessionStatus {
                state,
                close_reason: None,
                reconnect_attempts,
            };
            true
        });
        if changed {
            tracing::debug!(%state, reconnect_attempts, "session state changed");
        }
    }

    /// Publishes the terminal `Closed` state.
    pub(super) fn set_closed(&self, reason: CloseReason, reconnect_attempts: u32) {
        self.status.send_replace(SessionStatus {
            state: ConnectionState::Closed,
            close_reason: Some(reason),
            reconnect_attempts,
        });
        tracing::info!(?reason, "session closed");
    }

    pub(super) fn stop_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Decodes one inbound frame, appends it and notifies consumers.
    ///
    /// Malformed frames are logged and dropped; they never reach the log.
    pub(super) fn ingest(&self, frame: &str) {
        match Event::decode(frame) {
            Ok(event) => {
                let event = self.log.append(event);
                tracing::trace!(
                    seq = event.seq(),
                    event_type = event.event_type(),
                    stream_receivers = self.bus.receiver_count(),
                    "event appended"
                );
                self.bus.publish(Arc::clone(&event));
                self.subscribers.dispatch(&event);
            }
            Err(err) => tracing::warn!(
                code = err.code(),
                error = %err,
                bytes = frame.len(),
                "discarding malformed frame"
            ),
        }
    }
}

/// Handle to one logical session with the feed.
///
/// Cheap to clone; every clone refers to the same session. Construct one
/// per logical session and pass it to consumers explicitly. Dropping the
/// last clone shuts the session down without waiting for it.
///
/// ```no_run
/// # async fn demo() -> Result<(), flight_feed::error::SessionError> {
/// use flight_feed::config::SessionOptions;
/// use flight_feed::domain::Identity;
/// use flight_feed::session::SessionManager;
///
/// let session = SessionManager::new(SessionOptions::default());
/// session.subscribe(|event| {
///     println!("{} #{}", event.event_type(), event.seq());
///     Ok(())
/// })?;
/// session.start("ws://127.0.0.1:8080/connect", Identity::new("19640501"))?;
/// # Ok(())
/// # }
/// ```
pub struct SessionManager<C: Connector = WsConnector> {
    owner: Arc<Owner<C>>,
}

/// Held only by handles; the driver keeps `Shared` alive on its own.
struct Owner<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Drop for Owner<C> {
    // Last handle gone: the session ends as if `stop` had been called.
    fn drop(&mut self) {
        if !self.shared.shutdown.send_replace(true) {
            tracing::debug!("last session handle dropped; shutting down");
        }
    }
}

impl<C: Connector> Clone for SessionManager<C> {
    fn clone(&self) -> Self {
        Self {
            owner: Arc::clone(&self.owner),
        }
    }
}

impl<C: Connector> fmt::Debug for SessionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &*self.shared().status.borrow())
            .field("handshake_sent", &self.handshake_sent())
            .field("events", &self.shared().log.len())
            .field("subscribers", &self.shared().subscribers.len())
            .finish_non_exhaustive()
    }
}

impl SessionManager<WsConnector> {
    /// Creates a session that connects over WebSocket.
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        Self::with_connector(options, WsConnector)
    }
}

impl<C: Connector> SessionManager<C> {
    /// Creates a session that opens connections through `connector`.
    #[must_use]
    pub fn with_connector(options: SessionOptions, connector: C) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        let (shutdown, _) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            options,
            connector,
            status,
            shutdown,
            handshake_sent: AtomicBool::new(false),
            log: EventLog::new(options.retention),
            bus: EventBus::new(options.event_bus_capacity),
            subscribers: SubscriberRegistry::new(),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            driver: Mutex::new(None),
        });
        Self {
            owner: Arc::new(Owner { shared }),
        }
    }

    fn shared(&self) -> &Arc<Shared<C>> {
        &self.owner.shared
    }

    /// Starts the session.
    ///
    /// Moves to `Connecting` and spawns the driver task on the current Tokio
    /// runtime. Only one logical connection exists per manager: calling
    /// `start` again, while running or after the session ended, is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] for a non-WebSocket endpoint
    /// or a blank identity, and [`SessionError::NoRuntime`] when called
    /// outside a Tokio runtime.
    pub fn start(&self, endpoint: impl Into<String>, identity: Identity) -> Result<(), SessionError> {
        let endpoint = endpoint.into();
        validate_endpoint(&endpoint)?;
        identity.validate()?;
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        if self.shared().stop_requested() {
            tracing::info!("session already stopped; ignoring start");
            return Ok(());
        }
        let Some(outbound_rx) = self.shared().outbound_rx.lock().take() else {
            tracing::debug!("session already started; ignoring start");
            return Ok(());
        };

        self.shared().set_state(ConnectionState::Connecting, 0);
        let span = tracing::info_span!("feed_session", endpoint = %endpoint, client_id = %identity.id);
        let task = runtime.spawn(
            driver::run(Arc::clone(self.shared()), endpoint, identity, outbound_rx).instrument(span),
        );
        *self.shared().driver.lock() = Some(task);
        Ok(())
    }

    /// Sends one JSON payload to the feed.
    ///
    /// Delivery is at most once: nothing is buffered while the connection
    /// is down.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] unless the session is `Open`,
    /// [`SessionError::Serialization`] if `payload` cannot be encoded, and
    /// [`SessionError::TransportDropped`] if the write itself fails.
    pub async fn send<T>(&self, payload: &T) -> Result<(), SessionError>
    where
        T: Serialize + ?Sized,
    {
        if self.connection_state() != ConnectionState::Open {
            return Err(SessionError::NotConnected);
        }
        let text = serde_json::to_string(payload)?;
        let (reply, reply_rx) = oneshot::channel();
        self.shared()
            .outbound_tx
            .send(OutboundRequest { text, reply })
            .map_err(|_| SessionError::NotConnected)?;
        reply_rx.await.unwrap_or(Err(SessionError::NotConnected))
    }

    /// Sends `{"type":"chat","content":...}`.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::send`].
    pub async fn send_chat(&self, content: impl Into<String>) -> Result<(), SessionError> {
        self.send(&ChatMessage::new(content)).await
    }

    /// Current transport state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared().status.borrow().state
    }

    /// Current state together with the close reason, if any.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.shared().status.borrow()
    }

    /// Receiver that observes every status change.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared().status.subscribe()
    }

    /// Whether the join handshake has been written.
    #[must_use]
    pub fn handshake_sent(&self) -> bool {
        self.shared().handshake_sent.load(Ordering::Acquire)
    }

    /// Read-only view of the event history.
    #[must_use]
    pub fn event_log(&self) -> &EventLog {
        &self.shared().log
    }

    /// Registers a callback invoked once per appended event, in order.
    ///
    /// Errors and panics raised by the callback are logged and otherwise
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoRuntime`] when called outside a Tokio
    /// runtime.
    pub fn subscribe<F>(&self, callback: F) -> Result<SubscriptionId, SessionError>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared().subscribers.register(callback)
    }

    /// Removes a subscriber. Returns `false` if the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared().subscribers.remove(id)
    }

    /// Stream of appended events for async consumers.
    ///
    /// Receivers that fall more than the bus capacity behind skip events
    /// and get [`broadcast::error::RecvError::Lagged`]; the event log still
    /// has them.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<Arc<Event>> {
        self.shared().bus.subscribe()
    }

    /// Stops the session for good.
    ///
    /// Cancels any pending reconnect, closes the transport and waits for
    /// the driver to finish. Safe to call repeatedly and before `start`.
    pub async fn stop(&self) {
        self.shared().shutdown.send_replace(true);

        let driver = self.shared().driver.lock().take();
        match driver {
            Some(task) => {
                if let Err(e) = task.await {
                    tracing::error!(error = %e, "session driver ended abnormally");
                }
            }
            None if self.shared().outbound_rx.lock().is_none() => {
                // Another stop owns the driver handle; wait for it to settle.
                let mut status = self.shared().status.subscribe();
                let _ = status.wait_for(SessionStatus::is_terminal).await;
                return;
            }
            None => {}
        }

        // Never started, or the driver died: settle on Closed here.
        self.shared().status.send_if_modified(|status| {
            if status.is_terminal() {
                return false;
            }
            *status = SessionStatus {
                state: ConnectionState::Closed,
                close_reason: Some(CloseReason::Stopped),
                reconnect_attempts: status.reconnect_attempts,
            };
            true
        });
    }
}

//! Session driver: the single task that owns the connection lifecycle.
//!
//! ```text
//! start ─► Connecting ─► Open ─► (drop) ─► Connecting ─► … ─► Closed
//!                                   │                          ▲
//!                                   └── budget exhausted ──────┘
//! stop  ─► Closing ─► Closed
//! ```
//!
//! The driver is the only writer of status, the handshake flag and the
//! event log, so arrival order is append order without further locking.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use super::manager::{OutboundRequest, Shared};
use super::transport::{Connector, Transport};
use crate::domain::{CloseReason, ConnectionState, Identity, JoinMessage};
use crate::error::SessionError;

/// How an open connection ended.
enum Exit {
    Stopped,
    Dropped(SessionError),
}

/// Runs the session until it is stopped or the reconnect budget runs out.
pub(super) async fn run<C: Connector>(
    shared: Arc<Shared<C>>,
    endpoint: String,
    identity: Identity,
    mut outbound: mpsc::UnboundedReceiver<OutboundRequest>,
) {
    let mut shutdown = shared.shutdown.subscribe();
    let policy = shared.options.reconnect;
    let mut failures: u32 = 0;

    let reason = loop {
        if *shutdown.borrow_and_update() {
            shared.set_state(ConnectionState::Closing, failures);
            break CloseReason::Stopped;
        }

        shared.set_state(ConnectionState::Connecting, failures);
        tracing::info!(attempt = failures.saturating_add(1), "connecting to feed");
        let connected = shared.connector.connect(&endpoint).await;

        // An attempt in flight is never aborted; close what it produced.
        if shared.stop_requested() {
            shared.set_state(ConnectionState::Closing, failures);
            if let Ok(mut transport) = connected {
                transport.close().await;
            }
            break CloseReason::Stopped;
        }

        let cause = match connected {
            Ok(mut transport) => {
                failures = 0;
                shared.set_state(ConnectionState::Open, failures);
                tracing::info!("feed connection open");

                match run_open(&shared, &mut transport, &identity, &mut outbound, &mut shutdown).await {
                    Exit::Stopped => {
                        shared.set_state(ConnectionState::Closing, failures);
                        transport.close().await;
                        break CloseReason::Stopped;
                    }
                    Exit::Dropped(cause) => cause,
                }
            }
            Err(cause) => cause,
        };

        reject_pending(&mut outbound);
        failures = failures.saturating_add(1);
        tracing::warn!(
            code = cause.code(),
            error = %cause,
            failures,
            max_attempts = policy.max_attempts,
            "feed connection lost"
        );

        if failures >= policy.max_attempts {
            tracing::error!(failures, "reconnect budget exhausted; giving up");
            break CloseReason::ReconnectExhausted { attempts: failures };
        }

        shared.set_state(ConnectionState::Connecting, failures);
        if backoff(policy.interval, &mut outbound, &mut shutdown).await.is_break() {
            shared.set_state(ConnectionState::Closing, failures);
            break CloseReason::Stopped;
        }
    };

    shared.set_closed(reason, failures);
    reject_pending(&mut outbound);
}

/// Serves one open connection: handshake, then frames and sends until the
/// connection drops or a stop is requested.
async fn run_open<C: Connector>(
    shared: &Shared<C>,
    transport: &mut C::Transport,
    identity: &Identity,
    outbound: &mut mpsc::UnboundedReceiver<OutboundRequest>,
    shutdown: &mut watch::Receiver<bool>,
) -> Exit {
    if !shared.handshake_sent.load(Ordering::Acquire) {
        let join = match serde_json::to_string(&JoinMessage::from(identity)) {
            Ok(join) => join,
            Err(e) => return Exit::Dropped(e.into()),
        };
        if let Err(e) = transport.send_text(join).await {
            return Exit::Dropped(e);
        }
        shared.handshake_sent.store(true, Ordering::Release);
        tracing::info!(client_id = %identity.id, "join handshake sent");
    }

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Exit::Stopped;
                }
            }
            frame = transport.next_frame() => {
                match frame {
                    Some(Ok(text)) => shared.ingest(&text),
                    Some(Err(e)) => return Exit::Dropped(e),
                    None => {
                        return Exit::Dropped(SessionError::TransportDropped(
                            "closed by peer".to_string(),
                        ));
                    }
                }
            }
            Some(request) = outbound.recv() => {
                let result = transport.send_text(request.text).await;
                let failure = result.as_ref().err().map(ToString::to_string);
                let _ = request.reply.send(result);
                if let Some(reason) = failure {
                    return Exit::Dropped(SessionError::TransportDropped(reason));
                }
            }
        }
    }
}

/// Waits out the reconnect interval, rejecting sends meanwhile.
async fn backoff(
    interval: Duration,
    outbound: &mut mpsc::UnboundedReceiver<OutboundRequest>,
    shutdown: &mut watch::Receiver<bool>,
) -> ControlFlow<()> {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return ControlFlow::Break(());
                }
            }
            () = &mut sleep => return ControlFlow::Continue(()),
            Some(request) = outbound.recv() => {
                let _ = request.reply.send(Err(SessionError::NotConnected));
            }
        }
    }
}

/// Fails every send that queued up while the connection was not open.
fn reject_pending(outbound: &mut mpsc::UnboundedReceiver<OutboundRequest>) {
    while let Ok(request) = outbound.try_recv() {
        let _ = request.reply.send(Err(SessionError::NotConnected));
    }
}

//! In-memory connector for driving the session deterministically.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::transport::{Connector, Transport};
use crate::error::SessionError;

/// Connector whose attempts follow a script: each queued entry is either
/// an accepted connection or a refusal. An empty script refuses.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedConnector {
    script: Arc<Mutex<VecDeque<Attempt>>>,
    connects: Arc<AtomicUsize>,
}

#[derive(Debug)]
enum Attempt {
    Accept(ScriptedTransport),
    /// Resolves only once the paired sender fires or is dropped.
    Held(oneshot::Receiver<()>, ScriptedTransport),
    Refuse,
}

/// Server side of an accepted scripted connection.
#[derive(Debug)]
pub(crate) struct Peer {
    /// Frames pushed here arrive at the client. Dropping it hangs up.
    pub(crate) to_client: mpsc::UnboundedSender<String>,
    /// Frames the client wrote.
    pub(crate) from_client: mpsc::UnboundedReceiver<String>,
    /// Set once the client closed the connection.
    pub(crate) closed: Arc<AtomicBool>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues an attempt that succeeds and returns its server side.
    pub(crate) fn accept(&self) -> Peer {
        let (transport, peer) = pair();
        self.script.lock().push_back(Attempt::Accept(transport));
        peer
    }

    /// Queues an attempt that succeeds only after `release` fires.
    pub(crate) fn accept_held(&self) -> (Peer, oneshot::Sender<()>) {
        let (transport, peer) = pair();
        let (release, held) = oneshot::channel();
        self.script.lock().push_back(Attempt::Held(held, transport));
        (peer, release)
    }

    /// Queues an attempt that fails.
    pub(crate) fn refuse(&self) {
        self.script.lock().push_back(Attempt::Refuse);
    }

    /// Number of connect attempts made so far.
    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, _endpoint: &str) -> Result<ScriptedTransport, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(Attempt::Accept(transport)) => Ok(transport),
            Some(Attempt::Held(held, transport)) => {
                let _ = held.await;
                Ok(transport)
            }
            Some(Attempt::Refuse) => Err(SessionError::Connect("connection refused".to_string())),
            None => Err(SessionError::Connect("no scripted connection".to_string())),
        }
    }
}

fn pair() -> (ScriptedTransport, Peer) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let transport = ScriptedTransport {
        inbound,
        outbound,
        closed: Arc::clone(&closed),
    };
    let peer = Peer {
        to_client,
        from_client,
        closed,
    };
    (transport, peer)
}

#[derive(Debug)]
pub(crate) struct ScriptedTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl Transport for ScriptedTransport {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        self.outbound
            .send(text)
            .map_err(|_| SessionError::TransportDropped("peer gone".to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<String, SessionError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

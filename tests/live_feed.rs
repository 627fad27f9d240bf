//! End-to-end session tests against a local WebSocket server.

#![allow(clippy::panic)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use flight_feed::config::{ReconnectPolicy, SessionOptions};
use flight_feed::domain::{CloseReason, ConnectionState, Identity, RetentionPolicy, SessionStatus};
use flight_feed::session::SessionManager;

const WAIT: Duration = Duration::from_secs(5);

type ServerSide = WebSocketStream<TcpStream>;

fn options(max_attempts: u32) -> SessionOptions {
    SessionOptions {
        reconnect: ReconnectPolicy {
            interval: Duration::from_millis(20),
            max_attempts,
        },
        retention: RetentionPolicy::Unbounded,
        event_bus_capacity: 64,
    }
}

async fn bind() -> (TcpListener, String) {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("failed to bind test listener");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener has no local address");
    };
    (listener, format!("ws://{addr}/connect"))
}

async fn accept(listener: &TcpListener) -> ServerSide {
    let Ok(Ok((stream, _))) = timeout(WAIT, listener.accept()).await else {
        panic!("client never connected");
    };
    let Ok(ws) = accept_async(stream).await else {
        panic!("websocket upgrade failed");
    };
    ws
}

async fn next_json(ws: &mut ServerSide) -> Value {
    loop {
        let Ok(Some(Ok(message))) = timeout(WAIT, ws.next()).await else {
            panic!("client sent nothing");
        };
        if let Message::Text(text) = message {
            let Ok(value) = serde_json::from_str(text.as_str()) else {
                panic!("client sent invalid JSON: {text}");
            };
            return value;
        }
    }
}

async fn push(ws: &mut ServerSide, frame: &str) {
    if ws.send(Message::text(frame.to_owned())).await.is_err() {
        panic!("server write failed");
    }
}

async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn join_events_and_chat_over_a_real_socket() {
    let (listener, endpoint) = bind().await;
    let session = SessionManager::new(options(3));
    let Ok(()) = session.start(endpoint, Identity::new("42").with_name("Ada")) else {
        panic!("start failed");
    };

    let mut server = accept(&listener).await;
    assert_eq!(
        next_json(&mut server).await,
        json!({"type": "join", "id": "42", "username": "Ada"})
    );

    push(&mut server, r#"{"type":"flights","flights":{"F1":{"id":"F1"}}}"#).await;
    push(&mut server, "garbage").await;
    push(
        &mut server,
        r#"{"type":"message","message":{"name":"Bob","content":"hi","level":"info"}}"#,
    )
    .await;
    eventually("two events", || session.event_log().len() == 2).await;

    let types: Vec<String> = session
        .event_log()
        .snapshot()
        .iter()
        .map(|e| e.event_type().to_string())
        .collect();
    assert_eq!(types, vec!["flights", "message"]);
    let Some(last) = session.event_log().last() else {
        panic!("log is empty");
    };
    let Some(chat) = last.as_chat() else {
        panic!("message event without chat body");
    };
    assert_eq!(chat.name, "Bob");

    let Ok(()) = session.send_chat("hello tower").await else {
        panic!("send while open must succeed");
    };
    assert_eq!(
        next_json(&mut server).await,
        json!({"type": "chat", "content": "hello tower"})
    );

    session.stop().await;
    assert_eq!(session.connection_state(), ConnectionState::Closed);
    assert_eq!(session.status().close_reason, Some(CloseReason::Stopped));
}

#[tokio::test]
async fn reconnects_after_hangup_without_rejoining() {
    let (listener, endpoint) = bind().await;
    let session = SessionManager::new(options(5));
    let Ok(()) = session.start(endpoint, Identity::new("42")) else {
        panic!("start failed");
    };

    let mut first = accept(&listener).await;
    assert_eq!(next_json(&mut first).await["type"], "join");
    drop(first);

    let mut second = accept(&listener).await;
    push(&mut second, r#"{"type":"landing","flight_id":"F9"}"#).await;
    eventually("event after reconnect", || session.event_log().len() == 1).await;
    assert_eq!(session.connection_state(), ConnectionState::Open);
    assert!(session.handshake_sent());

    // Nothing, in particular no second join, arrives on the new connection.
    assert!(timeout(Duration::from_millis(150), second.next()).await.is_err());

    session.stop().await;
}

#[tokio::test]
async fn unreachable_endpoint_exhausts_the_budget() {
    let (listener, endpoint) = bind().await;
    drop(listener);

    let session = SessionManager::new(options(2));
    let mut status = session.watch_status();
    let Ok(()) = session.start(endpoint, Identity::new("42")) else {
        panic!("start failed");
    };

    let Ok(Ok(closed)) = timeout(WAIT, status.wait_for(SessionStatus::is_terminal)).await else {
        panic!("session never gave up");
    };
    assert_eq!(
        closed.close_reason,
        Some(CloseReason::ReconnectExhausted { attempts: 2 })
    );
    assert!(!session.handshake_sent());
    assert!(session.event_log().is_empty());
}

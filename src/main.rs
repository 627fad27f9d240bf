//! flight-feed client entry point.
//!
//! Connects to the feed described by the environment, logs every event,
//! and forwards each line typed on stdin as a chat message.

use std::io::BufRead;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use flight_feed::config::{FeedConfig, LogFormat};
use flight_feed::domain::{Event, EventKind};
use flight_feed::session::SessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = FeedConfig::from_env().context("loading feed configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
    tracing::info!(endpoint = %config.endpoint, client_id = %config.identity.id, "starting flight-feed");

    let session = SessionManager::new(config.session);
    session.subscribe(log_event)?;
    session.start(config.endpoint.clone(), config.identity.clone())?;

    let chat = tokio::spawn(forward_chat(session.clone(), read_stdin_lines()));
    let mut status = session.watch_status();

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, stopping");
            None
        }
        closed = status.wait_for(|s| s.is_terminal()) => {
            closed.ok().and_then(|s| s.error())
        }
    };

    session.stop().await;
    chat.abort();
    tracing::info!(
        events = session.event_log().total_appended(),
        "session finished"
    );

    match outcome {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Default subscriber: one log line per event.
fn log_event(event: &Event) -> anyhow::Result<()> {
    match event.kind() {
        EventKind::Message => {
            let chat = event
                .as_chat()
                .context("message event without a chat body")?;
            tracing::info!(
                seq = event.seq(),
                name = %chat.name,
                level = chat.level.as_deref().unwrap_or("-"),
                content = %chat.content,
                "chat"
            );
        }
        EventKind::Flights => {
            let active = event
                .payload()
                .get("flights")
                .and_then(|f| f.as_object())
                .map_or(0, serde_json::Map::len);
            tracing::info!(seq = event.seq(), active, "flights snapshot");
        }
        _ => tracing::info!(seq = event.seq(), event_type = event.event_type(), "event"),
    }
    Ok(())
}

/// Reads stdin on a plain thread so a pending read never holds up exit.
fn read_stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Sends each non-empty line as a chat message until stdin closes.
async fn forward_chat(session: SessionManager, mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = lines.recv().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = session.send_chat(line).await {
            tracing::warn!(code = e.code(), error = %e, "chat message dropped");
        }
    }
    tracing::debug!("stdin closed; chat input disabled");
}

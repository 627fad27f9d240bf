//! # flight-feed
//!
//! Reconnecting WebSocket session client for a live flight telemetry feed.
//!
//! This crate keeps one logical session open against a streaming endpoint,
//! announces the client once with a join handshake, decodes inbound JSON
//! frames into an ordered event log, and fans those events out to any
//! number of independent consumers (map, table and chat views, loggers).
//! Views themselves are not part of this crate: they read the log or
//! subscribe to it.
//!
//! ## Architecture
//!
//! ```text
//! Consumers (views, loggers, chat input)
//!     │  subscribe / events / event_log / send
//!     │
//!     ├── SessionManager (session/)
//!     │     └── driver task ── Connector ── WebSocket endpoint
//!     │
//!     ├── EventLog, EventBus (domain/)
//!     └── SubscriberRegistry (session/)
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod session;

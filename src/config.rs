//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Variable                     | Default                         |
//! |------------------------------|---------------------------------|
//! | `FEED_URL`                   | `ws://127.0.0.1:8080/connect`   |
//! | `FEED_CLIENT_ID`             | required                        |
//! | `FEED_USERNAME`              | unset                           |
//! | `FEED_RECONNECT_INTERVAL_MS` | `3000`                          |
//! | `FEED_RECONNECT_ATTEMPTS`    | `10`                            |
//! | `FEED_EVENT_LOG_CAPACITY`    | `0` (unbounded)                 |
//! | `FEED_EVENT_BUS_CAPACITY`    | `1024`                          |
//! | `LOG_FORMAT`                 | `text` (`json` also accepted)   |

use std::time::Duration;

use crate::domain::{Identity, RetentionPolicy};
use crate::error::SessionError;

const DEFAULT_FEED_URL: &str = "ws://127.0.0.1:8080/connect";
const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_EVENT_BUS_CAPACITY: usize = 1_024;

/// Fixed-delay reconnect policy.
///
/// After each consecutive failure the session waits `interval` and tries
/// again; once `max_attempts` consecutive failures have been counted
/// without reaching `Open`, the session closes for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay between a drop and the next connect attempt.
    pub interval: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
        }
    }
}

/// Settings fixed at `SessionManager` construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Reconnect behaviour after transport drops.
    pub reconnect: ReconnectPolicy,
    /// How much event history to keep.
    pub retention: RetentionPolicy,
    /// Capacity of the broadcast channel behind `SessionManager::events`.
    pub event_bus_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            retention: RetentionPolicy::Unbounded,
            event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
        }
    }
}

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level client configuration.
///
/// Loaded once at startup via [`FeedConfig::from_env`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint of the feed.
    pub endpoint: String,
    /// Identity announced in the join handshake.
    pub identity: Identity,
    /// Session construction settings.
    pub session: SessionOptions,
    /// Log output format.
    pub log_format: LogFormat,
}

impl FeedConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when an optional variable is not set or
    /// cannot be parsed. Calls `dotenvy::dotenv().ok()` to optionally load
    /// a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if `FEED_CLIENT_ID` is
    /// missing or `FEED_URL` is not a `ws://` or `wss://` URL.
    pub fn from_env() -> Result<Self, SessionError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same conditions as [`FeedConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string());
        validate_endpoint(&endpoint)?;

        let Some(client_id) = lookup("FEED_CLIENT_ID") else {
            return Err(SessionError::InvalidConfig(
                "FEED_CLIENT_ID is required".to_string(),
            ));
        };
        let mut identity = Identity::new(client_id);
        if let Some(name) = lookup("FEED_USERNAME") {
            identity = identity.with_name(name);
        }
        identity.validate()?;

        let interval_ms = parse_or(&lookup, "FEED_RECONNECT_INTERVAL_MS", DEFAULT_RECONNECT_INTERVAL_MS);
        let max_attempts = parse_or(&lookup, "FEED_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS);
        let log_capacity = parse_or(&lookup, "FEED_EVENT_LOG_CAPACITY", 0_usize);
        let event_bus_capacity = parse_or(&lookup, "FEED_EVENT_BUS_CAPACITY", DEFAULT_EVENT_BUS_CAPACITY);

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            endpoint,
            identity,
            session: SessionOptions {
                reconnect: ReconnectPolicy {
                    interval: Duration::from_millis(interval_ms),
                    max_attempts,
                },
                retention: RetentionPolicy::from_capacity(log_capacity),
                event_bus_capacity,
            },
            log_format,
        })
    }
}

/// Checks that `endpoint` looks like a WebSocket URL.
///
/// # Errors
///
/// Returns [`SessionError::InvalidConfig`] unless the URL starts with
/// `ws://` or `wss://` and has a non-empty host part.
pub fn validate_endpoint(endpoint: &str) -> Result<(), SessionError> {
    let rest = endpoint
        .strip_prefix("wss://")
        .or_else(|| endpoint.strip_prefix("ws://"));
    match rest {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
        _ => Err(SessionError::InvalidConfig(format!(
            "endpoint must be a ws:// or wss:// URL, got `{endpoint}`"
        ))),
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid values.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

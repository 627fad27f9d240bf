//! Connection lifecycle states.
//!
//! [`ConnectionState`] mirrors the four ready states of a WebSocket-class
//! transport. [`SessionStatus`] pairs it with the reason the session ended,
//! so consumers can tell a deliberate stop from an exhausted retry budget.

use std::fmt;

use serde::Serialize;

use crate::error::SessionError;

/// Lifecycle state of the session's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// A connection attempt (initial or reconnect) is in progress.
    Connecting,
    /// The transport is ready; sends are accepted.
    Open,
    /// A deliberate stop is tearing the transport down.
    Closing,
    /// No transport. Initial state before `start`, and terminal state.
    #[default]
    Closed,
}

impl ConnectionState {
    /// Returns the state as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CloseReason {
    /// `stop()` was called.
    Stopped,
    /// Too many consecutive transport failures without reaching `Open`.
    ReconnectExhausted {
        /// Consecutive failures counted when the session gave up.
        attempts: u32,
    },
}

/// Point-in-time view of the session, published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionStatus {
    /// Current transport state.
    pub state: ConnectionState,
    /// Set once the session has ended; `None` while running or before start.
    pub close_reason: Option<CloseReason>,
    /// Consecutive failures since the last successful open.
    pub reconnect_attempts: u32,
}

impl SessionStatus {
    /// Returns `true` if the session has ended and will not reconnect.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.close_reason.is_some()
    }

    /// Returns the fatal error behind this status, if any.
    #[must_use]
    pub fn error(&self) -> Option<SessionError> {
        match self.close_reason {
            Some(CloseReason::ReconnectExhausted { attempts }) => {
                Some(SessionError::ReconnectExhausted { attempts })
            }
            _ => None,
        }
    }
}

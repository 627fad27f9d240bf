//! Session error types.
//!
//! [`SessionError`] is the central error type for the client. Each variant
//! carries a stable snake_case code for structured logs and a fatality
//! flag telling callers whether the session can still make progress.

/// Client-side error enum.
///
/// # Fatality
///
/// | Variant              | Fatal | Recovery                              |
/// |----------------------|-------|---------------------------------------|
/// | `NotConnected`       | no    | payload dropped, caller informed      |
/// | `MalformedFrame`     | no    | frame discarded, warning logged       |
/// | `TransportDropped`   | no    | automatic reconnect within budget     |
/// | `Connect`            | no    | counts against the reconnect budget   |
/// | `ReconnectExhausted` | yes   | session is terminally `Closed`        |
/// | `InvalidConfig`      | yes   | session never starts                  |
/// | `NoRuntime`          | yes   | call from inside a Tokio runtime      |
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A send was attempted while the connection was not open.
    #[error("not connected")]
    NotConnected,

    /// An inbound frame could not be decoded into an event.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The transport closed or failed while the session was running.
    #[error("transport dropped: {0}")]
    TransportDropped(String),

    /// A connection attempt failed before the transport became ready.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The reconnect budget ran out; the session is over.
    #[error("reconnect budget exhausted after {attempts} consecutive failures")]
    ReconnectExhausted {
        /// Consecutive failures observed when the session gave up.
        attempts: u32,
    },

    /// The endpoint or identity handed to the session is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The call needs a Tokio runtime and none is running.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// An outbound payload could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// Returns a stable code for this variant, used as a log field.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::MalformedFrame(_) => "malformed_frame",
            Self::TransportDropped(_) => "transport_dropped",
            Self::Connect(_) => "connect_failed",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
            Self::InvalidConfig(_) => "invalid_config",
            Self::NoRuntime => "no_runtime",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Returns `true` if the session cannot recover from this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ReconnectExhausted { .. } | Self::InvalidConfig(_) | Self::NoRuntime
        )
    }
}

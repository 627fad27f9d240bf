//! Decoded inbound events.
//!
//! Every text frame the feed delivers is decoded into an [`Event`] before
//! it is appended to the [`super::EventLog`]. The session does not
//! interpret the payload; it only requires a JSON object carrying a string
//! `type` discriminator. [`EventKind`] is a convenience for consumers that
//! want to branch on the types the feed is known to emit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::messages::InboundChat;
use crate::error::SessionError;

/// Consumer-facing classification of the `type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Full snapshot of active flights keyed by flight id.
    Flights,
    /// Single plane position update.
    Plane,
    /// A plane crashed.
    Crashed,
    /// A plane landed.
    Landing,
    /// A plane took off.
    TakeOff,
    /// Chat message broadcast by the server.
    Message,
    /// Any type not listed above.
    Other,
}

impl EventKind {
    /// Classifies a raw `type` value.
    #[must_use]
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "flights" => Self::Flights,
            "plane" => Self::Plane,
            "crashed" => Self::Crashed,
            "landing" => Self::Landing,
            "take-off" => Self::TakeOff,
            "message" => Self::Message,
            _ => Self::Other,
        }
    }
}

/// One decoded inbound frame.
///
/// Immutable once appended. `seq` is assigned by the log at append time
/// and increases by one per appended event for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    seq: u64,
    received_at: DateTime<Utc>,
    #[serde(rename = "type")]
    event_type: String,
    payload: Value,
}

impl Event {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MalformedFrame`] if the frame is not JSON,
    /// is not a JSON object, or has no string `type` field.
    pub fn decode(frame: &str) -> Result<Self, SessionError> {
        let payload: Value = serde_json::from_str(frame)
            .map_err(|e| SessionError::MalformedFrame(e.to_string()))?;
        let Some(object) = payload.as_object() else {
            return Err(SessionError::MalformedFrame(
                "frame is not a JSON object".to_string(),
            ));
        };
        let Some(event_type) = object.get("type").and_then(Value::as_str) else {
            return Err(SessionError::MalformedFrame(
                "missing string `type` field".to_string(),
            ));
        };
        let event_type = event_type.to_string();

        Ok(Self {
            seq: 0,
            received_at: Utc::now(),
            event_type,
            payload,
        })
    }

    pub(crate) fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Position of this event in the session's arrival order, from 1.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// When the frame was decoded.
    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The raw `type` discriminator.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The `type` discriminator classified into a known kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::from_type(&self.event_type)
    }

    /// The full decoded frame, including the `type` field.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Extracts the chat body of a `message` event.
    ///
    /// Returns `None` for other kinds or when the `message` object does not
    /// have the expected shape.
    #[must_use]
    pub fn as_chat(&self) -> Option<InboundChat> {
        if self.kind() != EventKind::Message {
            return None;
        }
        let body = self.payload.get("message")?;
        serde_json::from_value(body.clone()).ok()
    }
}

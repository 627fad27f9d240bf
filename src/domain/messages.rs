//! Wire message shapes used by the feed.
//!
//! The session itself accepts any serializable payload; these are the
//! conventions the feed server understands.

use serde::{Deserialize, Serialize};

use super::Identity;

/// One-time handshake announcing the client identity.
///
/// Serializes as `{"type":"join","id":"...","username":"..."}`; the
/// `username` key is omitted when the identity has no display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "join")]
pub struct JoinMessage {
    /// Stable client identifier.
    pub id: String,
    /// Optional display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl From<&Identity> for JoinMessage {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            username: identity.name.clone(),
        }
    }
}

/// Chat line sent by this client: `{"type":"chat","content":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "chat")]
pub struct ChatMessage {
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a chat message.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Body of an inbound `message` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundChat {
    /// Sender display name.
    pub name: String,
    /// Message text.
    pub content: String,
    /// Severity or category, e.g. `"info"` or `"warn"`.
    #[serde(default)]
    pub level: Option<String>,
    /// Server timestamp, kept verbatim.
    #[serde(default)]
    pub date: Option<String>,
}

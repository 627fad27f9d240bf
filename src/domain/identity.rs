//! Client identity announced in the join handshake.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Who this client is, as announced to the feed server.
///
/// The `id` is a stable identifier supplied by the operator; `name` is an
/// optional display name shown next to chat messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable client identifier. Must not be blank.
    pub id: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Identity {
    /// Creates an identity without a display name.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Sets the display name. Blank names are treated as absent.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.trim().is_empty() {
            None
        } else {
            Some(name)
        };
        self
    }

    /// Checks that the identifier is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if `id` is empty or only
    /// whitespace.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.id.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "identity id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

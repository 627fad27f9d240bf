//! Domain layer: connection states, identity, events and the event log.
//!
//! Everything here is transport-agnostic. The session layer drives these
//! types; consumers read them.

pub mod connection_state;
pub mod event;
pub mod event_bus;
pub mod event_log;
pub mod identity;
pub mod messages;
pub mod subscription_id;

pub use connection_state::{CloseReason, ConnectionState, SessionStatus};
pub use event::{Event, EventKind};
pub use event_bus::EventBus;
pub use event_log::{EventLog, RetentionPolicy};
pub use identity::Identity;
pub use messages::{ChatMessage, InboundChat, JoinMessage};
pub use subscription_id::SubscriptionId;

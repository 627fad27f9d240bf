//! Session layer: connection lifecycle, transport and subscribers.
//!
//! [`SessionManager`] is the entry point. It drives one logical session
//! over any [`Connector`]; the default is [`WsConnector`].

mod driver;
pub mod manager;
pub mod subscribers;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::SessionManager;
pub use subscribers::SubscriberRegistry;
pub use transport::{Connector, Transport, WsConnector, WsTransport};

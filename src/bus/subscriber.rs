//! Core subscriber trait for the bus.

use std::sync::Arc;

use crate::error::{BusError, HandlerError};
use crate::event::Event;

/// Callback run once per message received on a subscribed topic.
///
/// Receives the topic and the decoded event. An `Err` is logged and the
/// subscription carries on.
pub type EventHandler = Arc<dyn Fn(&str, &Event) -> Result<(), HandlerError> + Send + Sync>;

/// Wrap a closure as an [`EventHandler`].
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&str, &Event) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Trait for receiving events from a message broker.
///
/// This is a push-based interface: the implementation owns the polling and
/// calls the handler.
pub trait Subscriber: Send + Sync {
    fn connect(&self) -> Result<(), BusError>;

    /// Stop every subscription and close the connection.
    fn disconnect(&self) -> Result<(), BusError>;

    /// Run `handler` for every message on `topic`.
    ///
    /// Fails with [`BusError::NotConnected`] before `connect`, and with
    /// [`BusError::AlreadySubscribed`] when `topic` already has a handler.
    fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), BusError>;
}

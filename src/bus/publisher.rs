//! Core publisher trait for the bus.

use crate::error::BusError;
use crate::event::Event;

/// Trait for publishing events to a message broker.
///
/// Implementations:
/// - [`AsyncPublisher`](crate::broker::AsyncPublisher) - any transport with a
///   producer connector (in-memory broker, Kafka)
/// - [`LogPublisher`](super::LogPublisher) - logs instead of sending
pub trait Publisher: Send + Sync {
    /// Open the transport connection. One attempt, no retries.
    fn connect(&self) -> Result<(), BusError>;

    /// Close the connection. Close errors are logged, not returned, and
    /// calling this when not connected is fine.
    fn disconnect(&self) -> Result<(), BusError>;

    /// Validate, translate and queue `event` for `topic`.
    ///
    /// Returns once the message is queued. Delivery failures after that
    /// point are never reported here.
    fn publish(&self, topic: &str, event: &Event) -> Result<(), BusError>;

    /// Publish several events to one topic.
    ///
    /// Default implementation publishes events sequentially and stops at the
    /// first error. Events before it stay queued.
    fn publish_batch(&self, topic: &str, events: &[Event]) -> Result<(), BusError> {
        for event in events {
            self.publish(topic, event)?;
        }
        Ok(())
    }
}

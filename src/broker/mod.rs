//! Broker adapters - the transports behind the bus traits.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  AsyncPublisher<C>                 TopicSubscriber<C>          │
//! │  connect/disconnect under a lock   connect/disconnect/subscribe│
//! │  publish: validate → translate →   one dispatch thread per     │
//! │           queue (lock-free)        topic, handler per message  │
//! │  two watcher threads per connection                            │
//! └───────────────────────────────────────────────────────────────┘
//!                 │                                │
//!                 ▼                                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │   ProducerConnector / AsyncProducer    ConsumerConnector /     │
//! │   + DeliveryReporter                   ConsumerSession/Consumer│
//! └───────────────────────────────────────────────────────────────┘
//!          │                          │
//!          ▼                          ▼
//!  ┌───────────────┐          ┌───────────────┐
//!  │ memory broker │          │ kafka (feature)│
//!  └───────────────┘          └───────────────┘
//! ```
//!
//! ## Delivery outcomes
//!
//! `publish` returns once the message is queued. The transport later reports
//! each queued message once, as a success or a failure, to the connection's
//! watchers. Those failures are never returned to the publishing caller.
//! Callers that need confirmation can put an id in the event and match it in
//! a [`DeliveryObserver`].

mod message;
mod publisher;
mod subscriber;
pub mod translate;
mod transport;
mod watcher;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use message::{Delivered, DeliveryFailure, Record, TransportMessage};
pub use publisher::AsyncPublisher;
pub use subscriber::{SubscriptionStats, TopicSubscriber, DEFAULT_POLL_INTERVAL};
pub use transport::{
    AsyncProducer, Consumer, ConsumerConnector, ConsumerSession, DeliveryReporter,
    ProducerConnector, StartOffset, DEFAULT_CHANNEL_BUFFER,
};
pub use watcher::{DeliveryObserver, DeliveryStats};

/// Lifecycle state of a publisher or subscriber connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

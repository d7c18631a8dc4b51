//! Event bus - publish/subscribe abstractions
//!
//! Application code talks to these traits, never to a transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Bus (registry)                            │
//! │  - one Publisher slot, one Subscriber slot                  │
//! │  - publish(event) / subscribe(type, handler)                │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Publisher + Subscriber Traits                   │
//! │  Publisher: connect / disconnect / publish(topic, event)    │
//! │  Subscriber: connect / disconnect / subscribe(topic, h)     │
//! └─────────────────────────────────────────────────────────────┘
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────────────┐
//! │ MemoryBroker│    │    Kafka    │    │    LogPublisher     │
//! │  (default)  │    │  (feature)  │    │  (publish only)     │
//! └─────────────┘    └─────────────┘    └─────────────────────┘
//! ```

mod bus;
mod log_publisher;
mod publisher;
mod subscriber;

pub use bus::{global, Bus};
pub use log_publisher::LogPublisher;
pub use publisher::Publisher;
pub use subscriber::{handler, EventHandler, Subscriber};

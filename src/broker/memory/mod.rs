//! In-process transport.
//!
//! [`MemoryBroker`] keeps a partitioned log per topic inside the process. It
//! is the default transport and stands in for a real broker in tests: outages
//! can be simulated and every stored record can be inspected.
//!
//! ```
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! use event_broker::broker::memory::MemoryBroker;
//! use event_broker::bus::{handler, Publisher, Subscriber};
//! use event_broker::{Event, EventType};
//!
//! let broker = MemoryBroker::default();
//! let subscriber = broker.subscriber();
//! subscriber.connect().unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! let tx = std::sync::Mutex::new(tx);
//! subscriber
//!     .subscribe("orders", handler(move |_topic, event| {
//!         tx.lock().unwrap().send(event.id().to_string()).unwrap();
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! let publisher = broker.publisher();
//! publisher.connect().unwrap();
//! publisher
//!     .publish("orders", &Event::with_string_payload("o-1", EventType::Operate, "{}"))
//!     .unwrap();
//!
//! assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "o-1");
//! publisher.disconnect().unwrap();
//! subscriber.disconnect().unwrap();
//! ```

mod broker;
mod consumer;
mod producer;

pub use broker::MemoryBroker;
pub use consumer::{MemoryConsumer, MemorySession};
pub use producer::MemoryProducer;

use serde::{Deserialize, Serialize};

use super::publisher::AsyncPublisher;
use super::subscriber::TopicSubscriber;
use super::transport::{
    ConsumerConnector, DeliveryReporter, ProducerConnector, StartOffset, DEFAULT_CHANNEL_BUFFER,
};
use crate::error::{ConfigError, TransportError};

/// Publisher backed by a [`MemoryBroker`].
pub type MemoryPublisher = AsyncPublisher<MemoryConnector>;

/// Subscriber backed by a [`MemoryBroker`].
pub type MemorySubscriber = TopicSubscriber<MemoryConnector>;

/// Settings of an in-process broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Name used as the endpoint in log lines.
    pub name: String,
    /// Partitions per topic.
    pub partitions: i32,
    /// Capacity of the send queue and of each outcome queue.
    pub channel_buffer_size: usize,
    /// Where new subscriptions start reading.
    pub start_offset: StartOffset,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            partitions: 3,
            channel_buffer_size: DEFAULT_CHANNEL_BUFFER,
            start_offset: StartOffset::Latest,
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partitions < 1 {
            return Err(ConfigError(format!(
                "partitions must be at least 1, got {}",
                self.partitions
            )));
        }
        if self.channel_buffer_size == 0 {
            return Err(ConfigError("channel_buffer_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Opens producers and consumers on a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryConnector {
    broker: MemoryBroker,
}

impl MemoryConnector {
    pub fn new(broker: MemoryBroker) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }
}

impl ProducerConnector for MemoryConnector {
    type Producer = MemoryProducer;

    fn endpoint(&self) -> String {
        self.broker.config().name.clone()
    }

    fn outcome_capacity(&self) -> usize {
        self.broker.config().channel_buffer_size
    }

    fn connect(&self, reporter: DeliveryReporter) -> Result<MemoryProducer, TransportError> {
        self.broker.check_available()?;
        MemoryProducer::start(self.broker.clone(), reporter)
    }
}

impl ConsumerConnector for MemoryConnector {
    type Session = MemorySession;

    fn endpoint(&self) -> String {
        self.broker.config().name.clone()
    }

    fn connect(&self) -> Result<MemorySession, TransportError> {
        self.broker.check_available()?;
        Ok(MemorySession::new(self.broker.clone()))
    }
}

impl MemoryBroker {
    /// A disconnected publisher on this broker.
    pub fn publisher(&self) -> MemoryPublisher {
        AsyncPublisher::new(MemoryConnector::new(self.clone())).with_name(self.config().name.clone())
    }

    /// A disconnected subscriber on this broker.
    pub fn subscriber(&self) -> MemorySubscriber {
        TopicSubscriber::new(MemoryConnector::new(self.clone()))
            .with_name(self.config().name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: MemoryConfig = serde_json::from_str(r#"{"partitions": 8}"#).unwrap();
        assert_eq!(config.partitions, 8);
        assert_eq!(config.name, "memory");
        assert_eq!(config.channel_buffer_size, DEFAULT_CHANNEL_BUFFER);
        assert_eq!(config.start_offset, StartOffset::Latest);
    }

    #[test]
    fn config_reads_start_offset() {
        let config: MemoryConfig =
            serde_json::from_str(r#"{"start_offset": "earliest"}"#).unwrap();
        assert_eq!(config.start_offset, StartOffset::Earliest);
    }

    #[test]
    fn config_rejects_zero_buffer() {
        let config = MemoryConfig {
            channel_buffer_size: 0,
            ..MemoryConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn connect_fails_while_unavailable() {
        let broker = MemoryBroker::default();
        broker.set_available(false);
        let connector = MemoryConnector::new(broker);
        let (reporter, _ok, _err) = crate::broker::transport::delivery_channels(1);
        assert!(ProducerConnector::connect(&connector, reporter).is_err());
        assert!(ConsumerConnector::connect(&connector).is_err());
    }
}

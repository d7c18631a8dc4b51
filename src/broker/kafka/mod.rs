//! Apache Kafka transport, built on `rdkafka`.
//!
//! Needs the native librdkafka library. Publishing goes through a
//! `ThreadedProducer` whose delivery reports feed the publisher's watchers;
//! each subscription gets its own group consumer.

mod config;
mod consumer;
mod producer;

pub use config::KafkaConfig;
pub use consumer::{KafkaConsumer, KafkaSession};
pub use producer::KafkaProducer;

use super::publisher::AsyncPublisher;
use super::subscriber::TopicSubscriber;
use super::transport::{ConsumerConnector, DeliveryReporter, ProducerConnector};
use crate::error::{ConfigError, TransportError};

/// Publisher backed by a Kafka cluster.
pub type KafkaPublisher = AsyncPublisher<KafkaConnector>;

/// Subscriber backed by a Kafka cluster.
pub type KafkaSubscriber = TopicSubscriber<KafkaConnector>;

/// Opens producers and consumer sessions from a [`KafkaConfig`].
#[derive(Debug, Clone)]
pub struct KafkaConnector {
    config: KafkaConfig,
}

impl KafkaConnector {
    pub fn new(config: KafkaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KafkaConfig {
        &self.config
    }
}

impl ProducerConnector for KafkaConnector {
    type Producer = KafkaProducer;

    fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    fn outcome_capacity(&self) -> usize {
        self.config.channel_buffer_size
    }

    fn connect(&self, reporter: DeliveryReporter) -> Result<KafkaProducer, TransportError> {
        KafkaProducer::connect(&self.config, reporter)
    }
}

impl ConsumerConnector for KafkaConnector {
    type Session = KafkaSession;

    fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    fn connect(&self) -> Result<KafkaSession, TransportError> {
        KafkaSession::connect(&self.config)
    }
}

/// A disconnected Kafka publisher. Fails if `config` cannot publish.
pub fn new_publisher(config: KafkaConfig) -> Result<KafkaPublisher, ConfigError> {
    config.validate_publisher()?;
    Ok(AsyncPublisher::new(KafkaConnector::new(config)).with_name("kafka"))
}

/// A disconnected Kafka subscriber. Fails if `config` cannot subscribe.
pub fn new_subscriber(config: KafkaConfig) -> Result<KafkaSubscriber, ConfigError> {
    config.validate_subscriber()?;
    Ok(TopicSubscriber::new(KafkaConnector::new(config)).with_name("kafka"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::ConnectionState;
    use crate::bus::Publisher;
    use crate::error::BusError;
    use crate::event::{Event, EventType};

    #[test]
    fn constructors_reject_bad_config() {
        let config = KafkaConfig {
            hosts: vec![],
            ..KafkaConfig::default()
        };
        assert!(new_publisher(config.clone()).is_err());
        assert!(new_subscriber(config).is_err());
    }

    #[test]
    fn publish_before_connect_needs_no_cluster() {
        let publisher = new_publisher(KafkaConfig::default()).unwrap();
        assert_eq!(publisher.state(), ConnectionState::Disconnected);

        let event = Event::with_string_payload("1", EventType::Alert, "{}");
        assert!(matches!(
            publisher.publish("t", &event),
            Err(BusError::NotConnected)
        ));
        assert!(publisher.disconnect().is_ok());
    }
}

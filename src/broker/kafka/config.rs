use std::collections::BTreeMap;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::broker::transport::{StartOffset, DEFAULT_CHANNEL_BUFFER};
use crate::error::ConfigError;

/// Connection settings for a Kafka cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Bootstrap brokers, `host:port`.
    pub hosts: Vec<String>,
    /// SASL user. Authentication is off when empty.
    pub username: String,
    pub password: String,
    /// SASL mechanism used when `username` is set.
    pub sasl_mechanism: String,
    pub client_id: String,
    /// Consumer group of the subscriber.
    pub group_id: String,
    /// Where a group without committed offsets starts reading.
    pub offset_reset: StartOffset,
    /// Capacity of the producer queue and of each outcome queue.
    pub channel_buffer_size: usize,
    /// How long closing a publisher waits for queued messages.
    pub flush_timeout_ms: u64,
    pub session_timeout_ms: u64,
    /// Raw librdkafka properties, applied last.
    pub extra: BTreeMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost:9092".to_string()],
            username: String::new(),
            password: String::new(),
            sasl_mechanism: "PLAIN".to_string(),
            client_id: "event-broker".to_string(),
            group_id: "event-broker".to_string(),
            offset_reset: StartOffset::Latest,
            channel_buffer_size: DEFAULT_CHANNEL_BUFFER,
            flush_timeout_ms: 5_000,
            session_timeout_ms: 10_000,
            extra: BTreeMap::new(),
        }
    }
}

impl KafkaConfig {
    pub fn validate_publisher(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() || self.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError("kafka hosts required".into()));
        }
        if !self.username.is_empty() && self.password.is_empty() {
            return Err(ConfigError("kafka password required when username is set".into()));
        }
        if self.channel_buffer_size == 0 {
            return Err(ConfigError("channel_buffer_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn validate_subscriber(&self) -> Result<(), ConfigError> {
        self.validate_publisher()?;
        if self.group_id.is_empty() {
            return Err(ConfigError("kafka group_id required".into()));
        }
        Ok(())
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub(crate) fn endpoint(&self) -> String {
        self.hosts.join(",")
    }

    /// Properties shared by producers and consumers.
    fn base_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.endpoint())
            .set("client.id", &self.client_id);

        if !self.username.is_empty() {
            config
                .set("security.protocol", "SASL_PLAINTEXT")
                .set("sasl.mechanism", &self.sasl_mechanism)
                .set("sasl.username", &self.username)
                .set("sasl.password", &self.password);
        }
        config
    }

    pub(crate) fn producer_config(&self) -> ClientConfig {
        let mut config = self.base_config();
        config.set(
            "queue.buffering.max.messages",
            self.channel_buffer_size.to_string(),
        );
        self.apply_extra(&mut config);
        config
    }

    pub(crate) fn consumer_config(&self) -> ClientConfig {
        let offset_reset = match self.offset_reset {
            StartOffset::Earliest => "earliest",
            StartOffset::Latest => "latest",
        };

        let mut config = self.base_config();
        config
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", offset_reset)
            .set("enable.auto.commit", "true")
            .set("session.timeout.ms", self.session_timeout_ms.to_string());
        self.apply_extra(&mut config);
        config
    }

    fn apply_extra(&self, config: &mut ClientConfig) {
        for (key, value) in &self.extra {
            config.set(key, value);
        }
    }
}

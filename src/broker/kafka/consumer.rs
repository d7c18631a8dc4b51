use std::time::Duration;

use rdkafka::consumer::{BaseConsumer, Consumer as _};
use rdkafka::message::{BorrowedMessage, Headers, Message};

use super::KafkaConfig;
use crate::broker::message::Record;
use crate::broker::transport::{Consumer, ConsumerSession};
use crate::error::TransportError;

/// A verified connection to the cluster. Hands out one consumer per topic.
pub struct KafkaSession {
    config: KafkaConfig,
}

impl KafkaSession {
    pub(crate) fn connect(config: &KafkaConfig) -> Result<Self, TransportError> {
        let probe: BaseConsumer = config
            .consumer_config()
            .create()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        probe
            .fetch_metadata(None, config.session_timeout())
            .map_err(|e| TransportError::Unavailable(format!("{}: {e}", config.endpoint())))?;

        Ok(Self {
            config: config.clone(),
        })
    }
}

impl ConsumerSession for KafkaSession {
    type Consumer = KafkaConsumer;

    fn consumer(&self, topic: &str) -> Result<KafkaConsumer, TransportError> {
        let consumer: BaseConsumer = self
            .config
            .consumer_config()
            .create()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| TransportError::Client(format!("subscribe {topic}: {e}")))?;

        Ok(KafkaConsumer { consumer })
    }
}

/// Group consumer subscribed to a single topic.
pub struct KafkaConsumer {
    consumer: BaseConsumer,
}

impl Consumer for KafkaConsumer {
    fn poll(&mut self, timeout: Duration) -> Result<Option<Record>, TransportError> {
        match self.consumer.poll(timeout) {
            None => Ok(None),
            Some(Ok(message)) => Ok(Some(to_record(&message))),
            Some(Err(err)) => Err(TransportError::Client(err.to_string())),
        }
    }
}

fn to_record(message: &BorrowedMessage<'_>) -> Record {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| {
                    let value = h.value.map(String::from_utf8_lossy).unwrap_or_default();
                    (h.key.to_string(), value.into_owned())
                })
                .collect()
        })
        .unwrap_or_default();

    Record {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
        headers,
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
    }
}

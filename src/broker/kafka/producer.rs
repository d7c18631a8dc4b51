use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rdkafka::client::ClientContext;
use rdkafka::message::{Header, Message, OwnedHeaders};
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use tracing::warn;

use super::KafkaConfig;
use crate::broker::message::{Delivered, DeliveryFailure, TransportMessage};
use crate::broker::transport::{AsyncProducer, DeliveryReporter};
use crate::error::TransportError;

/// Routes librdkafka delivery reports into the publisher's outcome queues.
pub struct DeliveryContext {
    reporter: Mutex<Option<DeliveryReporter>>,
}

impl DeliveryContext {
    fn new(reporter: DeliveryReporter) -> Self {
        Self {
            reporter: Mutex::new(Some(reporter)),
        }
    }

    /// Drop the reporter so the watchers see their queues close.
    fn release(&self) {
        self.reporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        let reporter = self.reporter.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(reporter) = reporter.as_ref() else {
            warn!("delivery report after close");
            return;
        };

        match result {
            Ok(message) => reporter.success(Delivered {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
            }),
            Err((error, message)) => reporter.failure(DeliveryFailure {
                topic: message.topic().to_string(),
                partition: (message.partition() >= 0).then_some(message.partition()),
                key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                error: TransportError::Client(error.to_string()),
            }),
        }
    }
}

/// Connected Kafka producer. librdkafka owns the send queue.
pub struct KafkaProducer {
    producer: ThreadedProducer<DeliveryContext>,
    flush_timeout: Duration,
}

impl KafkaProducer {
    pub(crate) fn connect(
        config: &KafkaConfig,
        reporter: DeliveryReporter,
    ) -> Result<Self, TransportError> {
        let producer: ThreadedProducer<DeliveryContext> = config
            .producer_config()
            .create_with_context(DeliveryContext::new(reporter))
            .map_err(|e| TransportError::Client(e.to_string()))?;

        // Creating a client does not talk to the cluster; a metadata round
        // trip does.
        if let Err(err) = producer
            .client()
            .fetch_metadata(None, config.session_timeout())
        {
            producer.context().release();
            return Err(TransportError::Unavailable(format!(
                "{}: {err}",
                config.endpoint()
            )));
        }

        Ok(Self {
            producer,
            flush_timeout: config.flush_timeout(),
        })
    }
}

impl AsyncProducer for KafkaProducer {
    fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        let mut record: BaseRecord<'_, str, [u8]> =
            BaseRecord::to(message.topic()).payload(message.payload());

        if let Some(partition) = message.partition() {
            record = record.partition(partition);
        }
        if let Some(key) = message.key() {
            record = record.key(key);
        }
        if let Some(headers) = message.headers() {
            let owned = headers.iter().fold(OwnedHeaders::new(), |acc, (key, value)| {
                acc.insert(Header {
                    key: key.as_str(),
                    value: Some(value.as_str()),
                })
            });
            record = record.headers(owned);
        }

        // Held across the enqueue so close cannot release the reporter
        // between the check and the send.
        let reporter = self
            .producer
            .context()
            .reporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if reporter.is_none() {
            return Err(TransportError::Closed);
        }

        self.producer
            .send(record)
            .map_err(|(err, _)| TransportError::Client(err.to_string()))
    }

    fn close(&self) -> Result<(), TransportError> {
        let flushed = self
            .producer
            .flush(self.flush_timeout)
            .map_err(|e| TransportError::Client(format!("flush: {e}")));
        self.producer.context().release();
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::transport::delivery_channels;
    use rdkafka::config::ClientConfig;

    // Creating the client does not contact the cluster, so no broker is needed.
    fn unconnected(reporter: DeliveryReporter) -> KafkaProducer {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", "127.0.0.1:1")
            .create_with_context(DeliveryContext::new(reporter))
            .unwrap();
        KafkaProducer {
            producer,
            flush_timeout: Duration::from_millis(10),
        }
    }

    fn message() -> TransportMessage {
        TransportMessage::new("audit".to_string(), b"{}".to_vec(), None, None, None)
    }

    #[test]
    fn send_after_release_is_closed() {
        let (reporter, _successes, _failures) = delivery_channels(4);
        let producer = unconnected(reporter);

        producer.producer.context().release();

        assert!(matches!(producer.send(message()), Err(TransportError::Closed)));
    }
}

use std::time::Duration;

use super::MemoryBroker;
use crate::broker::message::Record;
use crate::broker::transport::{Consumer, ConsumerSession, StartOffset};
use crate::error::TransportError;

/// A consumer session on a [`MemoryBroker`].
pub struct MemorySession {
    broker: MemoryBroker,
}

impl MemorySession {
    pub(crate) fn new(broker: MemoryBroker) -> Self {
        Self { broker }
    }
}

impl ConsumerSession for MemorySession {
    type Consumer = MemoryConsumer;

    fn consumer(&self, topic: &str) -> Result<MemoryConsumer, TransportError> {
        self.broker.check_available()?;
        let position = match self.broker.config().start_offset {
            StartOffset::Earliest => 0,
            StartOffset::Latest => self.broker.len(topic),
        };
        Ok(MemoryConsumer {
            broker: self.broker.clone(),
            topic: topic.to_string(),
            position,
        })
    }
}

/// Reads one topic in append order from its own position.
pub struct MemoryConsumer {
    broker: MemoryBroker,
    topic: String,
    position: usize,
}

impl MemoryConsumer {
    /// Index of the next record this consumer will read.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Consumer for MemoryConsumer {
    fn poll(&mut self, timeout: Duration) -> Result<Option<Record>, TransportError> {
        let record = self.broker.fetch(&self.topic, self.position, timeout)?;
        if record.is_some() {
            self.position += 1;
        }
        Ok(record)
    }
}

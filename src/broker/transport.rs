//! The seam between the generic adapters and concrete transports.
//!
//! A transport provides a connector for each direction. The generic
//! [`AsyncPublisher`](super::AsyncPublisher) and
//! [`TopicSubscriber`](super::TopicSubscriber) own the lifecycle, locking and
//! background threads; the transport only moves bytes.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::message::{Delivered, DeliveryFailure, Record, TransportMessage};
use crate::error::TransportError;

/// Default capacity of send queues and outcome queues.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Where a new subscription starts reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    /// Everything still retained by the transport.
    Earliest,
    /// Only messages written after the subscription was made.
    #[default]
    Latest,
}

/// Write side of the two bounded outcome queues of one connection.
///
/// The producer reports every message it accepted exactly once, either as a
/// success or as a failure. Dropping the reporter closes both queues, which
/// is what ends the watcher threads.
#[derive(Clone, Debug)]
pub struct DeliveryReporter {
    successes: SyncSender<Delivered>,
    failures: SyncSender<DeliveryFailure>,
}

impl DeliveryReporter {
    /// Report a stored message. Blocks while the success queue is full.
    pub fn success(&self, delivered: Delivered) {
        // The watcher only goes away during disconnect.
        let _ = self.successes.send(delivered);
    }

    /// Report a failed message. Blocks while the failure queue is full.
    pub fn failure(&self, failure: DeliveryFailure) {
        let _ = self.failures.send(failure);
    }
}

pub(crate) fn delivery_channels(
    capacity: usize,
) -> (
    DeliveryReporter,
    Receiver<Delivered>,
    Receiver<DeliveryFailure>,
) {
    let (successes, success_rx) = sync_channel(capacity);
    let (failures, failure_rx) = sync_channel(capacity);
    (
        DeliveryReporter {
            successes,
            failures,
        },
        success_rx,
        failure_rx,
    )
}

/// Opens producer connections for one transport.
pub trait ProducerConnector: Send + Sync + 'static {
    type Producer: AsyncProducer;

    /// Human-readable target used in log lines (hosts, broker name).
    fn endpoint(&self) -> String;

    /// Capacity of each outcome queue.
    fn outcome_capacity(&self) -> usize {
        DEFAULT_CHANNEL_BUFFER
    }

    /// Establish a connection. One attempt, no retries.
    fn connect(&self, reporter: DeliveryReporter) -> Result<Self::Producer, TransportError>;
}

/// A connected producer with an asynchronous send queue.
pub trait AsyncProducer: Send + Sync + 'static {
    /// Put a message on the send queue. Returns once the message is queued,
    /// blocking only as long as the transport's own queue does.
    fn send(&self, message: TransportMessage) -> Result<(), TransportError>;

    /// Flush and close. The reporter must be dropped before this returns,
    /// even when closing fails, so the watchers can finish.
    fn close(&self) -> Result<(), TransportError>;
}

/// Opens consumer sessions for one transport.
pub trait ConsumerConnector: Send + Sync + 'static {
    type Session: ConsumerSession;

    /// Human-readable target used in log lines.
    fn endpoint(&self) -> String;

    /// Establish a session. One attempt, no retries.
    fn connect(&self) -> Result<Self::Session, TransportError>;
}

/// A connected consumer session that hands out per-topic consumers.
pub trait ConsumerSession: Send + Sync + 'static {
    type Consumer: Consumer;

    fn consumer(&self, topic: &str) -> Result<Self::Consumer, TransportError>;

    fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Reads the messages of a single topic.
pub trait Consumer: Send + 'static {
    /// Wait up to `timeout` for the next record.
    fn poll(&mut self, timeout: Duration) -> Result<Option<Record>, TransportError>;
}

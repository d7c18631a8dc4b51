use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use tracing::trace;

use super::MemoryBroker;
use crate::broker::message::{DeliveryFailure, TransportMessage};
use crate::broker::transport::{AsyncProducer, DeliveryReporter};
use crate::error::TransportError;

/// Producer with a bounded send queue drained by one dispatcher thread.
///
/// The dispatcher appends each queued message to the broker and reports the
/// result. Closing lets it finish the queue, so every accepted message gets
/// exactly one outcome.
pub struct MemoryProducer {
    queue: RwLock<Option<SyncSender<TransportMessage>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryProducer {
    pub(crate) fn start(
        broker: MemoryBroker,
        reporter: DeliveryReporter,
    ) -> Result<Self, TransportError> {
        let (tx, rx) = sync_channel(broker.config().channel_buffer_size);
        let name = broker.config().name.clone();

        let dispatcher = thread::Builder::new()
            .name(format!("{name}-dispatch"))
            .spawn(move || dispatch(&broker, rx, reporter))
            .map_err(|e| TransportError::Client(format!("spawn dispatcher: {e}")))?;

        Ok(Self {
            queue: RwLock::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }
}

fn dispatch(broker: &MemoryBroker, rx: Receiver<TransportMessage>, reporter: DeliveryReporter) {
    for message in rx {
        match broker.append(&message) {
            Ok(delivered) => reporter.success(delivered),
            Err(error) => reporter.failure(DeliveryFailure {
                topic: message.topic().to_string(),
                partition: message.partition(),
                key: message.key().map(str::to_string),
                error,
            }),
        }
    }
    trace!("dispatcher finished");
}

impl AsyncProducer for MemoryProducer {
    fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        // Held across the send so close cannot slip in between.
        let queue = self.queue.read().unwrap_or_else(PoisonError::into_inner);
        let tx = queue.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message).map_err(|_| TransportError::Closed)
    }

    fn close(&self) -> Result<(), TransportError> {
        // Dropping the sender ends the dispatcher once the queue is empty.
        self.queue
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let handle = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| TransportError::Client("dispatcher panicked".into())),
            None => Ok(()),
        }
    }
}

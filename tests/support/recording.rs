//! A transport that records every enqueued message.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use event_broker::broker::{
    AsyncProducer, Delivered, DeliveryReporter, ProducerConnector, TransportMessage,
};
use event_broker::TransportError;

/// Connector whose producers push messages into a shared list and report
/// each one as delivered straight away.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    sent: Arc<Mutex<Vec<TransportMessage>>>,
    refuse: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
    fail_close: Arc<AtomicBool>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next connects fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make producers report an error from `close`, after releasing the reporter.
    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<TransportMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl ProducerConnector for RecordingConnector {
    type Producer = RecordingProducer;

    fn endpoint(&self) -> String {
        "recording".to_string()
    }

    fn connect(&self, reporter: DeliveryReporter) -> Result<RecordingProducer, TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("recording".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingProducer {
            sent: Arc::clone(&self.sent),
            reporter: Mutex::new(Some(reporter)),
            fail_close: Arc::clone(&self.fail_close),
        })
    }
}

pub struct RecordingProducer {
    sent: Arc<Mutex<Vec<TransportMessage>>>,
    reporter: Mutex<Option<DeliveryReporter>>,
    fail_close: Arc<AtomicBool>,
}

impl AsyncProducer for RecordingProducer {
    fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        let reporter = self.reporter.lock().unwrap();
        let reporter = reporter.as_ref().ok_or(TransportError::Closed)?;

        let mut sent = self.sent.lock().unwrap();
        reporter.success(Delivered {
            topic: message.topic().to_string(),
            partition: message.partition().unwrap_or(0),
            offset: sent.len() as i64,
            key: message.key().map(str::to_string),
        });
        sent.push(message);
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        self.reporter.lock().unwrap().take();
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Client("close failed".into()));
        }
        Ok(())
    }
}

//! Shared helpers for the integration suites.

#![allow(dead_code)]

pub mod recording;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use event_broker::broker::{Delivered, DeliveryFailure};
use event_broker::{DeliveryObserver, Event, EventType};

pub use recording::RecordingConnector;

/// Route library logs through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn event(id: &str) -> Event {
    Event::with_string_payload(id, EventType::Operate, r#"{"user":"ada"}"#).with_source("tests")
}

/// Counts outcomes and keeps the failed topics.
#[derive(Default)]
pub struct CountingObserver {
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub failures: Mutex<Vec<DeliveryFailure>>,
}

impl CountingObserver {
    pub fn total(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst) + self.failed.load(Ordering::SeqCst)
    }
}

impl DeliveryObserver for CountingObserver {
    fn on_success(&self, _delivered: &Delivered) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, failure: &DeliveryFailure) {
        self.failures.lock().unwrap().push(failure.clone());
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

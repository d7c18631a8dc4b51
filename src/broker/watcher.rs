//! Background watchers for asynchronous delivery outcomes.
//!
//! Every connected publisher runs two of them, one per outcome queue. They
//! log each outcome, count it, and forward it to an optional observer. There
//! is no way back to the `publish` call that queued the message.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use super::message::{Delivered, DeliveryFailure};

/// Receives delivery outcomes from the watcher threads.
///
/// Calls arrive on the watcher threads, in the order the transport emitted
/// them, which need not match the order of the `publish` calls.
pub trait DeliveryObserver: Send + Sync {
    fn on_success(&self, delivered: &Delivered) {
        let _ = delivered;
    }

    fn on_failure(&self, failure: &DeliveryFailure) {
        let _ = failure;
    }
}

/// Outcome counts observed by a publisher's watchers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub succeeded: u64,
    pub failed: u64,
}

impl DeliveryStats {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Default)]
pub(crate) struct DeliveryCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl DeliveryCounters {
    pub(crate) fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            succeeded: self.succeeded.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

/// The two watcher threads of one connection.
pub(crate) struct Watchers {
    success: Option<JoinHandle<()>>,
    failure: Option<JoinHandle<()>>,
}

impl Watchers {
    pub(crate) fn spawn(
        name: Arc<str>,
        successes: Receiver<Delivered>,
        failures: Receiver<DeliveryFailure>,
        counters: Arc<DeliveryCounters>,
        observer: Option<Arc<dyn DeliveryObserver>>,
    ) -> io::Result<Self> {
        let success = {
            let name = Arc::clone(&name);
            let counters = Arc::clone(&counters);
            let observer = observer.clone();
            thread::Builder::new()
                .name(format!("{name}-success"))
                .spawn(move || watch_success(&name, successes, &counters, observer.as_deref()))?
        };

        let failure = thread::Builder::new()
            .name(format!("{name}-failure"))
            .spawn(move || watch_failure(&name, failures, &counters, observer.as_deref()))?;

        Ok(Self {
            success: Some(success),
            failure: Some(failure),
        })
    }

    /// Wait for both watchers. They return once their queues are closed.
    pub(crate) fn join(mut self) {
        for handle in [self.success.take(), self.failure.take()].into_iter().flatten() {
            if handle.join().is_err() {
                error!("delivery watcher panicked");
            }
        }
    }
}

fn watch_success(
    name: &str,
    successes: Receiver<Delivered>,
    counters: &DeliveryCounters,
    observer: Option<&dyn DeliveryObserver>,
) {
    for delivered in successes {
        debug!(
            bus = name,
            topic = %delivered.topic,
            partition = delivered.partition,
            offset = delivered.offset,
            "send message success"
        );
        if let Some(observer) = observer {
            notify(name, || observer.on_success(&delivered));
        }
        counters.succeeded.fetch_add(1, Ordering::AcqRel);
    }
}

fn watch_failure(
    name: &str,
    failures: Receiver<DeliveryFailure>,
    counters: &DeliveryCounters,
    observer: Option<&dyn DeliveryObserver>,
) {
    for failure in failures {
        error!(
            bus = name,
            topic = %failure.topic,
            partition = ?failure.partition,
            error = %failure.error,
            "send message failed"
        );
        if let Some(observer) = observer {
            notify(name, || observer.on_failure(&failure));
        }
        counters.failed.fetch_add(1, Ordering::AcqRel);
    }
}

/// Run one observer callback. A panicking observer must not end the watcher.
fn notify(name: &str, callback: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!(bus = name, "delivery observer panicked");
    }
}

//! Connection lifecycle and handler dispatch shared by every consuming
//! transport.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::message::Record;
use super::transport::{Consumer, ConsumerConnector, ConsumerSession};
use super::translate;
use super::ConnectionState;
use crate::bus::{EventHandler, Subscriber};
use crate::error::{BusError, TransportError};

/// Default wait per poll of a subscription's consumer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Statistics from one subscription's dispatch thread.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Messages the handler accepted.
    pub handled: usize,
    /// Messages that failed to decode, or whose handler failed or panicked.
    pub failed: usize,
    /// Poll cycles completed.
    pub polls: usize,
}

/// Subscriber over any [`ConsumerConnector`].
///
/// Each `subscribe` call starts one background thread that polls the topic
/// and calls the handler once per message. A failing or panicking handler is
/// logged and the thread keeps going. A topic takes one handler: subscribing
/// it again is rejected with [`BusError::AlreadySubscribed`] and the first
/// handler stays in place.
pub struct TopicSubscriber<C: ConsumerConnector> {
    name: Arc<str>,
    connector: C,
    poll_interval: Duration,
    state: AtomicU8,
    inner: Mutex<Inner<C::Session>>,
}

struct Inner<S> {
    session: Option<Arc<S>>,
    subscriptions: HashMap<String, Subscription>,
}

impl<C: ConsumerConnector> TopicSubscriber<C> {
    pub fn new(connector: C) -> Self {
        Self {
            name: Arc::from("bus"),
            connector,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            inner: Mutex::new(Inner {
                session: None,
                subscriptions: HashMap::new(),
            }),
        }
    }

    /// Name carried by every log line of this subscriber.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Arc::from(name.into());
        self
    }

    /// How long each poll waits for a message before checking for shutdown.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Topics with an active handler, sorted.
    pub fn subscriptions(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut topics: Vec<String> = inner.subscriptions.keys().cloned().collect();
        topics.sort();
        topics
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl<C: ConsumerConnector> Subscriber for TopicSubscriber<C> {
    fn connect(&self) -> Result<(), BusError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if inner.session.is_some() {
            debug!(bus = %self.name, "already connected");
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        let endpoint = self.connector.endpoint();
        debug!(bus = %self.name, %endpoint, "try connect");

        match self.connector.connect() {
            Ok(session) => {
                inner.session = Some(Arc::new(session));
                self.set_state(ConnectionState::Connected);
                info!(bus = %self.name, %endpoint, "connected");
                Ok(())
            }
            Err(err) => {
                error!(bus = %self.name, %endpoint, error = %err, "connect failed");
                self.set_state(ConnectionState::Disconnected);
                Err(err.into())
            }
        }
    }

    fn disconnect(&self) -> Result<(), BusError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(session) = inner.session.take() else {
            debug!(bus = %self.name, "disconnect without connection");
            return Ok(());
        };

        for (topic, subscription) in inner.subscriptions.drain() {
            let stats = subscription.stop();
            info!(
                bus = %self.name,
                %topic,
                handled = stats.handled,
                failed = stats.failed,
                "subscription stopped"
            );
        }

        if let Err(err) = session.close() {
            error!(bus = %self.name, error = %err, "failed to close consumer cleanly");
        }
        self.set_state(ConnectionState::Disconnected);
        info!(bus = %self.name, "disconnected");
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), BusError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let session = inner.session.clone().ok_or(BusError::NotConnected)?;
        if inner.subscriptions.contains_key(topic) {
            warn!(bus = %self.name, topic, "topic already subscribed");
            return Err(BusError::AlreadySubscribed(topic.to_string()));
        }

        let consumer = session.consumer(topic)?;
        let subscription = Subscription::spawn(
            Arc::clone(&self.name),
            topic.to_string(),
            consumer,
            handler,
            self.poll_interval,
        )?;
        inner.subscriptions.insert(topic.to_string(), subscription);
        info!(bus = %self.name, topic, "subscribed");
        Ok(())
    }
}

impl<C: ConsumerConnector> Drop for TopicSubscriber<C> {
    fn drop(&mut self) {
        // Dropping a subscription signals its thread without waiting for it.
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        inner.subscriptions.clear();
    }
}

/// Handle to one subscription's dispatch thread.
struct Subscription {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<SubscriptionStats>>,
}

impl Subscription {
    fn spawn<K: Consumer>(
        name: Arc<str>,
        topic: String,
        mut consumer: K,
        handler: EventHandler,
        poll_interval: Duration,
    ) -> Result<Self, TransportError> {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::Builder::new()
            .name(format!("{name}-sub-{topic}"))
            .spawn(move || {
                let mut stats = SubscriptionStats::default();

                loop {
                    match stop_rx.try_recv() {
                        Ok(()) | Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }

                    stats.polls += 1;

                    match consumer.poll(poll_interval) {
                        Ok(Some(record)) => {
                            if dispatch(&name, &topic, &record, &handler) {
                                stats.handled += 1;
                            } else {
                                stats.failed += 1;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(bus = %name, %topic, error = %err, "poll failed");
                            thread::sleep(poll_interval);
                        }
                    }
                }

                stats
            })
            .map_err(|e| TransportError::Client(format!("spawn subscription: {e}")))?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    /// Stop the dispatch thread and wait for it. Returns its stats.
    fn stop(mut self) -> SubscriptionStats {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default()
        } else {
            SubscriptionStats::default()
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

/// Decode one record and run the handler on it. Returns whether it succeeded.
fn dispatch(name: &str, topic: &str, record: &Record, handler: &EventHandler) -> bool {
    let event = match translate::decode_event(&record.payload) {
        Ok(event) => event,
        Err(err) => {
            warn!(
                bus = name,
                topic,
                partition = record.partition,
                offset = record.offset,
                error = %err,
                "dropping undecodable message"
            );
            return false;
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| handler(topic, &event))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!(bus = name, topic, event_id = event.id(), error = %err, "handler failed");
            false
        }
        Err(_) => {
            error!(bus = name, topic, event_id = event.id(), "handler panicked");
            false
        }
    }
}

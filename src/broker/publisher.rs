//! Connection lifecycle shared by every publishing transport.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use tracing::{debug, error, info};

use super::transport::{delivery_channels, AsyncProducer, ProducerConnector};
use super::translate;
use super::watcher::{DeliveryCounters, DeliveryObserver, DeliveryStats, Watchers};
use super::ConnectionState;
use crate::bus::Publisher;
use crate::error::{BusError, TransportError};
use crate::event::Event;

/// Fire-and-forget publisher over any [`ProducerConnector`].
///
/// `connect` and `disconnect` run under one lock. `publish` does not take
/// that lock: it loads the producer handle, which `connect` publishes with a
/// single atomic store once the connection and both watchers are up, and
/// `disconnect` removes with a single atomic swap. A `publish` racing a
/// `disconnect` therefore sees either the old producer (whose queue may
/// already refuse the message with [`TransportError::Closed`]) or no
/// producer at all ([`BusError::NotConnected`]).
///
/// `publish` returns as soon as the message is queued. Whether it was
/// delivered is only known to the watcher threads, which log it, count it in
/// [`stats`](Self::stats) and pass it to the optional observer.
pub struct AsyncPublisher<C: ProducerConnector> {
    name: Arc<str>,
    connector: C,
    observer: Option<Arc<dyn DeliveryObserver>>,
    state: AtomicU8,
    producer: ArcSwapOption<C::Producer>,
    watchers: Mutex<Option<Watchers>>,
    counters: Arc<DeliveryCounters>,
}

impl<C: ProducerConnector> AsyncPublisher<C> {
    pub fn new(connector: C) -> Self {
        Self {
            name: Arc::from("bus"),
            connector,
            observer: None,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            producer: ArcSwapOption::empty(),
            watchers: Mutex::new(None),
            counters: Arc::new(DeliveryCounters::default()),
        }
    }

    /// Name carried by every log line of this publisher and its watchers.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Arc::from(name.into());
        self
    }

    /// Forward every delivery outcome to `observer` as well as the log.
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Outcomes observed by the watchers so far, across all connections.
    pub fn stats(&self) -> DeliveryStats {
        self.counters.snapshot()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl<C: ProducerConnector> Publisher for AsyncPublisher<C> {
    fn connect(&self) -> Result<(), BusError> {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);

        if self.producer.load().is_some() {
            debug!(bus = %self.name, "already connected");
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        let endpoint = self.connector.endpoint();
        debug!(bus = %self.name, %endpoint, "try connect");

        let (reporter, successes, failures) =
            delivery_channels(self.connector.outcome_capacity());

        let producer = match self.connector.connect(reporter) {
            Ok(producer) => producer,
            Err(err) => {
                error!(bus = %self.name, %endpoint, error = %err, "connect failed");
                self.set_state(ConnectionState::Disconnected);
                return Err(err.into());
            }
        };

        let spawned = Watchers::spawn(
            Arc::clone(&self.name),
            successes,
            failures,
            Arc::clone(&self.counters),
            self.observer.clone(),
        );
        match spawned {
            Ok(spawned) => *watchers = Some(spawned),
            Err(err) => {
                if let Err(close_err) = producer.close() {
                    error!(bus = %self.name, error = %close_err, "close after failed connect");
                }
                self.set_state(ConnectionState::Disconnected);
                return Err(TransportError::Client(format!("spawn watcher: {err}")).into());
            }
        }

        self.producer.store(Some(Arc::new(producer)));
        self.set_state(ConnectionState::Connected);
        info!(bus = %self.name, %endpoint, "connected");
        Ok(())
    }

    fn disconnect(&self) -> Result<(), BusError> {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(producer) = self.producer.swap(None) else {
            debug!(bus = %self.name, "disconnect without connection");
            return Ok(());
        };

        if let Err(err) = producer.close() {
            error!(bus = %self.name, error = %err, "failed to close producer cleanly");
        }
        drop(producer);

        if let Some(watchers) = watchers.take() {
            watchers.join();
        }
        self.set_state(ConnectionState::Disconnected);

        let stats = self.stats();
        info!(
            bus = %self.name,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "disconnected"
        );
        Ok(())
    }

    fn publish(&self, topic: &str, event: &Event) -> Result<(), BusError> {
        event.validate()?;

        let producer = self.producer.load_full().ok_or(BusError::NotConnected)?;
        let message = translate::to_message(topic, event)?;
        producer.send(message)?;
        Ok(())
    }
}

impl<C: ProducerConnector> Drop for AsyncPublisher<C> {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.swap(None) {
            if let Err(err) = producer.close() {
                error!(bus = %self.name, error = %err, "failed to close producer on drop");
            }
        }
    }
}

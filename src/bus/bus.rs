//! Bus registry - holds the active publisher and subscriber.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::{EventHandler, Publisher, Subscriber};
use crate::error::BusError;
use crate::event::{Event, EventType};

/// Holds at most one active publisher and one active subscriber.
///
/// Both slots start empty. Setting a slot replaces whatever was there and
/// hands the old instance back; nothing is disconnected automatically, so
/// the caller decides what happens to it.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use event_broker::bus::{Bus, LogPublisher};
/// use event_broker::{Event, EventType};
///
/// let bus = Bus::new();
/// bus.set_publisher(Arc::new(LogPublisher::new()));
///
/// // Published on the topic named after the event type.
/// bus.publish(&Event::with_string_payload("evt-1", EventType::Alert, "{}")).unwrap();
/// ```
#[derive(Default)]
pub struct Bus {
    publisher: RwLock<Option<Arc<dyn Publisher>>>,
    subscriber: RwLock<Option<Arc<dyn Subscriber>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_publisher(&self) -> Option<Arc<dyn Publisher>> {
        self.publisher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_subscriber(&self) -> Option<Arc<dyn Subscriber>> {
        self.subscriber
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `publisher`, returning the one it replaces.
    pub fn set_publisher(&self, publisher: Arc<dyn Publisher>) -> Option<Arc<dyn Publisher>> {
        self.publisher
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(publisher)
    }

    /// Install `subscriber`, returning the one it replaces.
    pub fn set_subscriber(&self, subscriber: Arc<dyn Subscriber>) -> Option<Arc<dyn Subscriber>> {
        self.subscriber
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(subscriber)
    }

    /// Publish `event` on the topic named after its type.
    pub fn publish(&self, event: &Event) -> Result<(), BusError> {
        let publisher = self
            .get_publisher()
            .ok_or(BusError::NotInitialized("publisher"))?;
        publisher.publish(event.event_type().as_str(), event)
    }

    /// Subscribe `handler` to the topic named after `event_type`.
    pub fn subscribe(&self, event_type: &EventType, handler: EventHandler) -> Result<(), BusError> {
        let subscriber = self
            .get_subscriber()
            .ok_or(BusError::NotInitialized("subscriber"))?;
        subscriber.subscribe(event_type.as_str(), handler)
    }
}

/// The process-wide bus.
///
/// Intended to be filled once during startup and read afterwards. Code that
/// can pass a [`Bus`] around should prefer that.
pub fn global() -> &'static Bus {
    static GLOBAL: OnceLock<Bus> = OnceLock::new();
    GLOBAL.get_or_init(Bus::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{handler, LogPublisher};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSubscriber {
        topics: Mutex<Vec<String>>,
    }

    impl Subscriber for RecordingSubscriber {
        fn connect(&self) -> Result<(), BusError> {
            Ok(())
        }

        fn disconnect(&self) -> Result<(), BusError> {
            Ok(())
        }

        fn subscribe(&self, topic: &str, _handler: EventHandler) -> Result<(), BusError> {
            self.topics.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    fn event() -> Event {
        Event::with_string_payload("evt-1", EventType::Operate, "{}")
    }

    #[test]
    fn empty_slots_are_not_initialized() {
        let bus = Bus::new();
        assert!(bus.get_publisher().is_none());
        assert!(bus.get_subscriber().is_none());

        assert!(matches!(
            bus.publish(&event()),
            Err(BusError::NotInitialized("publisher"))
        ));
        assert!(matches!(
            bus.subscribe(&EventType::Operate, handler(|_, _| Ok(()))),
            Err(BusError::NotInitialized("subscriber"))
        ));
    }

    #[test]
    fn publish_uses_event_type_as_topic() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let bus = Bus::new();
        bus.set_publisher(Arc::new(LogPublisher::with_buffer(buffer.clone())));

        bus.publish(&event()).unwrap();
        assert!(buffer.lock().unwrap()[0].starts_with("operate "));
    }

    #[test]
    fn subscribe_uses_event_type_as_topic() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let bus = Bus::new();
        bus.set_subscriber(subscriber.clone());

        bus.subscribe(&EventType::Custom("audit".into()), handler(|_, _| Ok(())))
            .unwrap();
        assert_eq!(*subscriber.topics.lock().unwrap(), vec!["audit".to_string()]);
    }

    #[test]
    fn set_returns_the_replaced_instance() {
        let first: Arc<dyn Publisher> = Arc::new(LogPublisher::new());
        let bus = Bus::new();

        assert!(bus.set_publisher(first.clone()).is_none());
        let replaced = bus.set_publisher(Arc::new(LogPublisher::new())).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
    }
}

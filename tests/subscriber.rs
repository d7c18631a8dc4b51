//! Subscriber lifecycle and handler dispatch over the in-memory broker.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use event_broker::broker::StartOffset;
use event_broker::bus::{handler, EventHandler};
use event_broker::{
    BusError, ConnectionState, Event, MemoryBroker, MemoryConfig, Publisher, Subscriber,
};

use support::{event, init_tracing};

const WAIT: Duration = Duration::from_secs(5);

/// A handler forwarding `(topic, event)` to the returned receiver.
fn channel_handler() -> (EventHandler, Receiver<(String, Event)>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let handler = handler(move |topic, event| {
        tx.lock().unwrap().send((topic.to_string(), event.clone()))?;
        Ok(())
    });
    (handler, rx)
}

fn publish(broker: &MemoryBroker, topic: &str, events: &[Event]) {
    let publisher = broker.publisher();
    publisher.connect().unwrap();
    for event in events {
        publisher.publish(topic, event).unwrap();
    }
    publisher.disconnect().unwrap();
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn subscribe_before_connect_is_not_connected() {
    let subscriber = MemoryBroker::default().subscriber();
    let (handler, _rx) = channel_handler();

    assert!(matches!(
        subscriber.subscribe("audit", handler),
        Err(BusError::NotConnected)
    ));
    assert!(subscriber.subscriptions().is_empty());
}

#[test]
fn disconnect_stops_every_subscription() {
    init_tracing();
    let broker = MemoryBroker::default();
    let subscriber = broker.subscriber();
    subscriber.connect().unwrap();
    assert_eq!(subscriber.state(), ConnectionState::Connected);

    let (first, _rx1) = channel_handler();
    let (second, _rx2) = channel_handler();
    subscriber.subscribe("b", first).unwrap();
    subscriber.subscribe("a", second).unwrap();
    assert_eq!(subscriber.subscriptions(), vec!["a", "b"]);

    subscriber.disconnect().unwrap();
    assert!(subscriber.subscriptions().is_empty());
    assert_eq!(subscriber.state(), ConnectionState::Disconnected);

    // Second disconnect is a no-op.
    subscriber.disconnect().unwrap();
}

#[test]
fn connect_fails_while_broker_is_down() {
    let broker = MemoryBroker::default();
    broker.set_available(false);
    let subscriber = broker.subscriber();

    assert!(matches!(subscriber.connect(), Err(BusError::Transport(_))));
    assert_eq!(subscriber.state(), ConnectionState::Disconnected);
}

// =============================================================================
// Dispatch
// =============================================================================

#[test]
fn handler_receives_published_events() {
    init_tracing();
    let broker = MemoryBroker::default();
    let subscriber = broker.subscriber().with_poll_interval(Duration::from_millis(20));
    subscriber.connect().unwrap();

    let (handler, rx) = channel_handler();
    subscriber.subscribe("orders", handler).unwrap();

    let sent = event("order-1")
        .with_meta("key", "user-42")
        .with_meta("headers", "trace:abc");
    publish(&broker, "orders", &[sent.clone()]);

    let (topic, received) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(topic, "orders");
    assert_eq!(received, sent);

    subscriber.disconnect().unwrap();
}

#[test]
fn each_topic_gets_its_own_handler() {
    let broker = MemoryBroker::default();
    let subscriber = broker.subscriber();
    subscriber.connect().unwrap();

    let (orders, orders_rx) = channel_handler();
    let (payments, payments_rx) = channel_handler();
    subscriber.subscribe("orders", orders).unwrap();
    subscriber.subscribe("payments", payments).unwrap();

    publish(&broker, "payments", &[event("pay-1")]);
    publish(&broker, "orders", &[event("order-1")]);

    assert_eq!(orders_rx.recv_timeout(WAIT).unwrap().1.id(), "order-1");
    assert_eq!(payments_rx.recv_timeout(WAIT).unwrap().1.id(), "pay-1");
    assert!(orders_rx.try_recv().is_err());

    subscriber.disconnect().unwrap();
}

#[test]
fn resubscribe_is_rejected_and_first_handler_stays() {
    init_tracing();
    let broker = MemoryBroker::default();
    let subscriber = broker.subscriber();
    subscriber.connect().unwrap();

    let (first, first_rx) = channel_handler();
    let second_calls = Arc::new(AtomicUsize::new(0));
    let second = {
        let calls = Arc::clone(&second_calls);
        handler(move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };

    subscriber.subscribe("orders", first).unwrap();
    let err = subscriber.subscribe("orders", second).unwrap_err();
    assert!(matches!(err, BusError::AlreadySubscribed(ref t) if t == "orders"));

    publish(&broker, "orders", &[event("order-1")]);

    assert_eq!(first_rx.recv_timeout(WAIT).unwrap().1.id(), "order-1");
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);

    subscriber.disconnect().unwrap();
}

#[test]
fn failing_and_panicking_handlers_do_not_stop_delivery() {
    init_tracing();
    let broker = MemoryBroker::default();
    let subscriber = broker.subscriber();
    subscriber.connect().unwrap();

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    subscriber
        .subscribe(
            "orders",
            handler(move |_, event| match event.id() {
                "fails" => Err("handler rejected the event".into()),
                "panics" => panic!("handler blew up"),
                id => {
                    tx.lock().unwrap().send(id.to_string())?;
                    Ok(())
                }
            }),
        )
        .unwrap();

    publish(
        &broker,
        "orders",
        &[event("fails"), event("panics"), event("order-1")],
    );

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "order-1");
    subscriber.disconnect().unwrap();
}

#[test]
fn latest_start_skips_earlier_messages() {
    let broker = MemoryBroker::default();
    publish(&broker, "orders", &[event("before")]);

    let subscriber = broker.subscriber();
    subscriber.connect().unwrap();
    let (handler, rx) = channel_handler();
    subscriber.subscribe("orders", handler).unwrap();

    publish(&broker, "orders", &[event("after")]);

    assert_eq!(rx.recv_timeout(WAIT).unwrap().1.id(), "after");
    subscriber.disconnect().unwrap();
}

#[test]
fn earliest_start_replays_the_topic() {
    let broker = MemoryBroker::new(MemoryConfig {
        start_offset: StartOffset::Earliest,
        ..MemoryConfig::default()
    })
    .unwrap();
    publish(&broker, "orders", &[event("first"), event("second")]);

    let subscriber = broker.subscriber();
    subscriber.connect().unwrap();
    let (handler, rx) = channel_handler();
    subscriber.subscribe("orders", handler).unwrap();

    let mut ids = vec![
        rx.recv_timeout(WAIT).unwrap().1.id().to_string(),
        rx.recv_timeout(WAIT).unwrap().1.id().to_string(),
    ];
    ids.sort();
    assert_eq!(ids, vec!["first", "second"]);

    subscriber.disconnect().unwrap();
}

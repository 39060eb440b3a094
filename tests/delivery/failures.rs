//! Listener failures and default handlers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use message_bus::{Arg, BroadcastDirection, Listener, Message, MessageBus, Topic};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::Registry;

use crate::support::{log, wire_handler, Exploding, Ping, Recorder, Wire};

/// Counts ERROR events.
#[derive(Clone, Default)]
struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn with_error_counter<R>(f: impl FnOnce() -> R) -> (R, usize) {
    let counter = ErrorCounter::default();
    let subscriber = Registry::default().with(counter.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, counter.count())
}

#[test]
fn panicking_listener_does_not_stop_siblings() {
    let bus = MessageBus::new("app");
    let topic: Topic<dyn Ping> = Topic::with_direction("pings", BroadcastDirection::None);
    let log = log();

    let exploding: Arc<dyn Ping> = Arc::new(Exploding);
    let first = bus.connect();
    first.subscribe(&topic, exploding).unwrap();
    let second = bus.connect();
    second.subscribe(&topic, Recorder::handler("b", &log)).unwrap();

    let ((), errors) = with_error_counter(|| bus.sync_publisher(&topic).ping(9));

    assert_eq!(*log.lock(), vec!["b:9"]);
    assert_eq!(errors, 1);
    let stats = bus.stats();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.failed, 1);
}

#[test]
fn default_handler_receives_raw_messages() {
    let bus = MessageBus::new("app");
    let topic: Topic<dyn Wire> = Topic::new("wire");
    let log = log();

    let connection = bus.connect();
    connection.set_default_handler(wire_handler(&log));
    connection.subscribe_default(&topic).unwrap();

    let publisher = bus.sync_publisher(&topic);
    publisher.ping(1);
    publisher.ping(2);

    assert_eq!(*log.lock(), vec!["wire:1", "wire:2"]);
}

#[test]
fn unsupported_methods_are_skipped_without_error_logs() {
    let bus = MessageBus::new("app");
    let topic: Topic<dyn Wire> = Topic::new("wire");
    let log = log();

    let connection = bus.connect();
    connection.set_default_handler(wire_handler(&log));
    connection.subscribe_default(&topic).unwrap();

    let publisher = bus.sync_publisher(&topic);
    let ((), errors) = with_error_counter(|| {
        publisher.ping(5);
        publisher.pong();
    });
    assert_eq!(errors, 0);

    let ((), errors) = with_error_counter(|| publisher.fail("disk full".to_string()));
    assert_eq!(errors, 1);

    assert_eq!(*log.lock(), vec!["wire:5"]);
    let stats = bus.stats();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 1);
}

#[test]
fn mistyped_message_is_reported_not_delivered() {
    let bus = MessageBus::new("app");
    let topic: Topic<dyn Ping> = Topic::new("pings");
    let log = log();

    let connection = bus.connect();
    connection.subscribe(&topic, Recorder::handler("a", &log)).unwrap();

    let method = <dyn Ping as Listener>::method("ping").unwrap();
    let ((), errors) = with_error_counter(|| {
        bus.send_message(Message::new(
            topic.info().clone(),
            method,
            vec![Box::new("not a number".to_string()) as Arg],
        ));
        bus.send_message(Message::new(topic.info().clone(), method, Vec::new()));
    });

    assert!(log.lock().is_empty());
    assert_eq!(errors, 2);
    assert_eq!(bus.stats().failed, 2);
}

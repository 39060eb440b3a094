//! Disconnecting connections and disposing buses.

use std::sync::Arc;

use message_bus::{BroadcastDirection, BusError, Disposer, MessageBus};

use crate::support::{Ping, Recorder, Tree};

#[test]
fn disconnect_twice_is_a_no_op() {
    let tree = Tree::new(BroadcastDirection::ToChildren);
    let project = &tree.connections[1];

    project.disconnect();
    project.disconnect();
    tree.project.sync_publisher(&tree.topic).ping(1);

    assert_eq!(tree.take(), vec!["module-a:1", "module-b:1"]);
    assert_eq!(tree.project.subscriber_count(&tree.topic), 0);
}

#[test]
fn disconnect_discards_queued_messages() {
    let tree = Tree::new(BroadcastDirection::ToChildren);

    tree.project.async_publisher(&tree.topic).ping(2);
    tree.connections[2].disconnect();
    tree.application.pump_messages();

    assert_eq!(tree.take(), vec!["project:2", "module-b:2"]);
}

#[test]
fn disposing_a_scope_disconnects_its_connections() {
    let tree = Tree::new(BroadcastDirection::None);
    let scope = Disposer::new("editor");

    let handler: Arc<dyn Ping> = Arc::new(Recorder::new("editor", &tree.log));
    let connection = tree.project.connect_in(&scope);
    connection.subscribe(&tree.topic, handler).unwrap();

    tree.project.sync_publisher(&tree.topic).ping(3);
    assert_eq!(tree.take(), vec!["project:3", "editor:3"]);

    drop(scope);
    assert!(connection.is_disconnected());

    tree.project.sync_publisher(&tree.topic).ping(4);
    assert_eq!(tree.take(), vec!["project:4"]);
}

#[test]
fn disposed_child_no_longer_receives_broadcasts() {
    let tree = Tree::new(BroadcastDirection::ToChildren);

    tree.module_a.async_publisher(&tree.topic).ping(5);
    tree.module_a.dispose();

    assert_eq!(tree.project.children(), vec![tree.module_b.clone()]);
    assert!(!tree.module_a.has_undelivered_events(&tree.topic));

    tree.application.sync_publisher(&tree.topic).ping(6);
    assert_eq!(tree.take(), vec!["application:6", "project:6", "module-b:6"]);

    tree.module_a.sync_publisher(&tree.topic).ping(7);
    assert!(tree.take().is_empty());

    let late = tree.module_a.connect();
    let handler: Arc<dyn Ping> = Arc::new(Recorder::new("late", &tree.log));
    assert_eq!(
        late.subscribe(&tree.topic, handler),
        Err(BusError::BusDisposed("module-a".to_string()))
    );
}

#[test]
fn disposed_bus_roots_its_live_subtree() {
    let tree = Tree::new(BroadcastDirection::ToChildren);

    tree.project.dispose();
    assert!(tree.project.parent().is_none());
    assert_eq!(tree.module_a.parent(), Some(tree.project.clone()));

    tree.module_a.sync_publisher(&tree.topic).ping(1);
    assert_eq!(tree.take(), vec!["module-a:1"]);
    assert!(!tree.module_a.has_undelivered_events(&tree.topic));

    tree.module_b.async_publisher(&tree.topic).ping(2);
    tree.module_a.pump_messages();
    assert_eq!(tree.take(), vec!["module-b:2"]);

    tree.application.sync_publisher(&tree.topic).ping(3);
    assert_eq!(tree.take(), vec!["application:3"]);
}

#[test]
fn dropped_child_bus_is_skipped() {
    let tree = Tree::new(BroadcastDirection::ToChildren);
    {
        let scratch = MessageBus::with_parent("scratch", &tree.application);
        let handler: Arc<dyn Ping> = Arc::new(Recorder::new("scratch", &tree.log));
        scratch.connect().subscribe(&tree.topic, handler).unwrap();
        assert_eq!(tree.application.children().len(), 2);
    }

    tree.application.sync_publisher(&tree.topic).ping(8);

    assert_eq!(tree.application.children(), vec![tree.project.clone()]);
    assert_eq!(
        tree.take(),
        vec!["application:8", "project:8", "module-a:8", "module-b:8"]
    );
}

#[test]
fn connection_outlives_its_bus() {
    let bus = MessageBus::new("transient");
    let connection = bus.connect();
    assert_eq!(connection.bus(), Some(bus.clone()));

    drop(bus);

    assert!(connection.bus().is_none());
    connection.deliver_immediately();
    connection.disconnect();
}

#[cfg(feature = "serde")]
#[test]
fn stats_render_as_json() {
    let tree = Tree::new(BroadcastDirection::None);
    tree.project.sync_publisher(&tree.topic).ping(9);

    let json = tree.project.stats().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["posted"], 1);
    assert_eq!(value["delivered"], 1);
    assert_eq!(value["failed"], 0);
    assert_eq!(value["skipped"], 0);
}

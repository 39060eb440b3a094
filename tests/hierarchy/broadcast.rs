//! Broadcast directions.

use std::sync::Arc;

use message_bus::{BroadcastDirection, MessageBus, Topic};
use parking_lot::Mutex;

use crate::support::{Ping, Recorder, Tree};

#[test]
fn to_children_reaches_every_descendant_but_no_ancestor() {
    let tree = Tree::new(BroadcastDirection::ToChildren);

    tree.project.sync_publisher(&tree.topic).ping(1);
    assert_eq!(tree.take(), vec!["project:1", "module-a:1", "module-b:1"]);

    tree.application.sync_publisher(&tree.topic).ping(2);
    assert_eq!(
        tree.take(),
        vec!["application:2", "project:2", "module-a:2", "module-b:2"]
    );
}

#[test]
fn to_parent_reaches_every_ancestor_but_no_sibling() {
    let tree = Tree::new(BroadcastDirection::ToParent);

    tree.module_a.sync_publisher(&tree.topic).ping(3);

    // Pumping starts at the root.
    assert_eq!(tree.take(), vec!["application:3", "project:3", "module-a:3"]);
}

#[test]
fn none_stays_on_the_publishing_bus() {
    let tree = Tree::new(BroadcastDirection::None);

    tree.project.sync_publisher(&tree.topic).ping(4);
    tree.module_b.sync_publisher(&tree.topic).ping(5);

    assert_eq!(tree.take(), vec!["project:4", "module-b:5"]);
}

#[test]
fn pumping_any_bus_drains_the_whole_tree() {
    let tree = Tree::new(BroadcastDirection::ToChildren);

    tree.project.async_publisher(&tree.topic).ping(6);
    assert!(tree.take().is_empty());
    assert!(tree.module_a.has_undelivered_events(&tree.topic));

    tree.module_b.pump_messages();

    assert_eq!(tree.take(), vec!["project:6", "module-a:6", "module-b:6"]);
    assert!(!tree.module_a.has_undelivered_events(&tree.topic));
}

#[test]
fn each_bus_counts_what_reaches_it() {
    let tree = Tree::new(BroadcastDirection::ToChildren);

    tree.project.sync_publisher(&tree.topic).ping(7);

    assert_eq!(tree.application.stats().posted, 0);
    assert_eq!(tree.project.stats().posted, 1);
    assert_eq!(tree.module_a.stats().delivered, 1);
    assert_eq!(tree.module_b.stats().delivered, 1);
}

#[test]
fn ping_reaches_child_until_disconnected() {
    let root = MessageBus::new("R");
    let child = MessageBus::with_parent("C", &root);
    let topic: Topic<dyn Ping> = Topic::with_direction("ping", BroadcastDirection::ToChildren);
    let log = Arc::new(Mutex::new(Vec::new()));

    let handler: Arc<dyn Ping> = Arc::new(Recorder::new("C", &log));
    let connection = child.connect();
    connection.subscribe(&topic, handler).unwrap();

    root.sync_publisher(&topic).ping(42);
    assert_eq!(*log.lock(), vec!["C:42"]);

    connection.disconnect();
    root.sync_publisher(&topic).ping(7);
    assert_eq!(*log.lock(), vec!["C:42"]);
}

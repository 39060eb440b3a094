//! The message bus hub.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::stats::{BusStats, StatsCounters};
use super::DeliveryJob;
use crate::connection::{ConnectionInner, MessageBusConnection};
use crate::dispose::{Disposable, Disposer};
use crate::message::Message;
use crate::publisher::{PublishMode, Publisher};
use crate::queue::ThreadQueues;
use crate::topic::{BroadcastDirection, Listener, Topic, TopicInfo};

type PublisherCache = RwLock<HashMap<TopicInfo, Box<dyn Any + Send + Sync>>>;

pub(crate) struct BusInner {
    owner: String,
    /// Cleared on dispose: the disposed bus becomes the root of its subtree.
    parent: RwLock<Option<Weak<BusInner>>>,
    /// Copy-on-write: fan-out walks a snapshot.
    children: RwLock<Arc<Vec<Weak<BusInner>>>>,
    /// Copy-on-write per topic; insertion order is notification order.
    subscribers: RwLock<HashMap<TopicInfo, Arc<Vec<Arc<ConnectionInner>>>>>,
    sync_publishers: PublisherCache,
    async_publishers: PublisherCache,
    jobs: ThreadQueues<DeliveryJob>,
    disposed: AtomicBool,
    stats: StatsCounters,
}

impl BusInner {
    fn new(owner: String, parent: Option<&Arc<BusInner>>) -> Arc<Self> {
        let bus = Arc::new(Self {
            owner,
            parent: RwLock::new(parent.map(Arc::downgrade)),
            children: RwLock::new(Arc::new(Vec::new())),
            subscribers: RwLock::new(HashMap::new()),
            sync_publishers: RwLock::new(HashMap::new()),
            async_publishers: RwLock::new(HashMap::new()),
            jobs: ThreadQueues::new(),
            disposed: AtomicBool::new(false),
            stats: StatsCounters::default(),
        });

        if let Some(parent) = parent {
            parent.add_child(&bus);
        }
        bus
    }

    pub(crate) fn owner(&self) -> &str {
        &self.owner
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn parent(&self) -> Option<Arc<BusInner>> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }

    fn root(self: &Arc<Self>) -> Arc<BusInner> {
        let mut bus = Arc::clone(self);
        while let Some(parent) = bus.parent() {
            bus = parent;
        }
        bus
    }

    fn live_children(&self) -> Vec<Arc<BusInner>> {
        let children = Arc::clone(&self.children.read());
        children.iter().filter_map(Weak::upgrade).collect()
    }

    fn add_child(&self, child: &Arc<BusInner>) {
        let mut children = self.children.write();
        let mut next: Vec<Weak<BusInner>> = children
            .iter()
            .filter(|c| c.strong_count() > 0)
            .cloned()
            .collect();
        next.push(Arc::downgrade(child));
        *children = Arc::new(next);
        debug!(bus = %self.owner, child = %child.owner, "child bus registered");
    }

    fn remove_child(&self, child: &BusInner) {
        let mut children = self.children.write();
        let next: Vec<Weak<BusInner>> = children
            .iter()
            .filter(|c| c.strong_count() > 0 && !std::ptr::eq(c.as_ptr(), child))
            .cloned()
            .collect();
        *children = Arc::new(next);
        debug!(bus = %self.owner, child = %child.owner, "child bus detached");
    }

    pub(crate) fn add_subscriber(&self, topic: &TopicInfo, connection: Arc<ConnectionInner>) {
        let mut subscribers = self.subscribers.write();
        let entry = subscribers
            .entry(topic.clone())
            .or_insert_with(|| Arc::new(Vec::new()));
        let mut next = Vec::with_capacity(entry.len() + 1);
        next.extend(entry.iter().cloned());
        next.push(connection);
        *entry = Arc::new(next);
    }

    fn subscribers_of(&self, topic: &TopicInfo) -> Option<Arc<Vec<Arc<ConnectionInner>>>> {
        self.subscribers.read().get(topic).cloned()
    }

    /// Forget a disconnected connection: drop it from every subscriber
    /// list and purge its queued jobs.
    pub(crate) fn connection_terminated(&self, connection: &Arc<ConnectionInner>) {
        {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|_, list| {
                if list.iter().any(|c| Arc::ptr_eq(c, connection)) {
                    let next: Vec<_> = list
                        .iter()
                        .filter(|c| !Arc::ptr_eq(c, connection))
                        .cloned()
                        .collect();
                    *list = Arc::new(next);
                }
                !list.is_empty()
            });
        }
        self.jobs.retain(|job| !job.targets(connection));
    }

    /// Fan a message out to this bus's subscribers, then to children or
    /// the parent according to the topic's direction.
    pub(crate) fn post_message(self: &Arc<Self>, message: &Arc<Message>) {
        if self.is_disposed() {
            trace!(bus = %self.owner, topic = message.topic().name(), "bus disposed, not posting");
            return;
        }

        self.stats.record_post();
        trace!(
            bus = %self.owner,
            topic = message.topic().name(),
            method = message.method().name,
            "posting message"
        );

        if let Some(subscribers) = self.subscribers_of(message.topic()) {
            for connection in subscribers.iter() {
                if connection.schedule_message_delivery(message) {
                    self.jobs
                        .push(DeliveryJob::new(Arc::clone(connection), Arc::clone(message)));
                }
            }
        }

        match message.topic().direction() {
            BroadcastDirection::ToChildren => {
                for child in self.live_children() {
                    child.post_message(message);
                }
            }
            BroadcastDirection::ToParent => {
                if let Some(parent) = self.parent() {
                    parent.post_message(message);
                }
            }
            BroadcastDirection::None => {}
        }
    }

    /// Drain, post, drain: every reachable subscriber has run on return.
    pub(crate) fn send_message(self: &Arc<Self>, message: Arc<Message>) {
        if self.is_disposed() {
            warn!(
                bus = %self.owner,
                topic = message.topic().name(),
                method = message.method().name,
                "publishing on a disposed bus, dropping message"
            );
            return;
        }
        self.pump_messages();
        self.post_message(&message);
        self.pump_messages();
    }

    pub(crate) fn pump_messages(self: &Arc<Self>) {
        self.root().do_pump_messages();
    }

    fn do_pump_messages(&self) {
        while self.deliver_single_message() {}
        for child in self.live_children() {
            child.do_pump_messages();
        }
    }

    /// Deliver the oldest job queued on this bus by the calling thread.
    /// Returns false when there was nothing to deliver.
    pub(crate) fn deliver_single_message(&self) -> bool {
        let Some(job) = self.jobs.pop_front() else {
            return false;
        };
        let delivery = job.deliver();
        self.stats.record(delivery);
        true
    }

    fn publisher<L: ?Sized + Listener>(self: &Arc<Self>, topic: &Topic<L>, mode: PublishMode) -> Arc<L> {
        let cache = match mode {
            PublishMode::Sync => &self.sync_publishers,
            PublishMode::Async => &self.async_publishers,
        };
        let create = || {
            L::publisher(Publisher::new(
                Arc::downgrade(self),
                topic.info().clone(),
                L::methods(),
                mode,
            ))
        };

        if let Some(publisher) = cache
            .read()
            .get(topic.info())
            .and_then(|cached| (**cached).downcast_ref::<Arc<L>>())
        {
            return Arc::clone(publisher);
        }

        let mut cache = cache.write();
        let cached = cache
            .entry(topic.info().clone())
            .or_insert_with(|| Box::new(create()) as Box<dyn Any + Send + Sync>);
        match (**cached).downcast_ref::<Arc<L>>() {
            Some(publisher) => Arc::clone(publisher),
            None => create(),
        }
    }

    fn has_undelivered_events(&self, topic: &TopicInfo) -> bool {
        self.subscribers_of(topic)
            .map_or(false, |subscribers| subscribers.iter().any(|c| c.has_pending(topic)))
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        for job in self.jobs.drain() {
            job.connection.discard_pending(&job.message);
        }
        let parent = self.parent.write().take();
        if let Some(parent) = parent.as_ref().and_then(Weak::upgrade) {
            parent.remove_child(self);
        }
        debug!(bus = %self.owner, "message bus disposed");
    }
}

/// A publish/subscribe hub.
///
/// Buses form a tree: a bus created with [`MessageBus::with_parent`] is a
/// child of that parent. The parent keeps only a registration of the child,
/// and the child only a weak reference to the parent; dropping a bus handle
/// does not keep either alive.
///
/// `MessageBus` is a cheap handle; clones refer to the same bus.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Create a root bus.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            inner: BusInner::new(owner.into(), None),
        }
    }

    /// Create a bus registered as the last child of `parent`.
    pub fn with_parent(owner: impl Into<String>, parent: &MessageBus) -> Self {
        Self {
            inner: BusInner::new(owner.into(), Some(&parent.inner)),
        }
    }

    pub(crate) fn from_inner(inner: Arc<BusInner>) -> Self {
        Self { inner }
    }

    /// Name of whatever owns this bus.
    pub fn owner(&self) -> &str {
        self.inner.owner()
    }

    pub fn parent(&self) -> Option<MessageBus> {
        self.inner.parent().map(Self::from_inner)
    }

    /// Live child buses, in registration order.
    pub fn children(&self) -> Vec<MessageBus> {
        self.inner
            .live_children()
            .into_iter()
            .map(Self::from_inner)
            .collect()
    }

    /// Open a new connection for subscribing to topics on this bus.
    #[must_use]
    pub fn connect(&self) -> MessageBusConnection {
        MessageBusConnection::new(&self.inner)
    }

    /// Open a connection that is disconnected when `scope` is disposed.
    #[must_use]
    pub fn connect_in(&self, scope: &Disposer) -> MessageBusConnection {
        let connection = self.connect();
        scope.register(connection.clone());
        connection
    }

    /// Publisher whose calls are delivered before they return.
    ///
    /// Each call first drains whatever is pending anywhere in this bus's
    /// tree (on the calling thread), then posts, then drains again.
    pub fn sync_publisher<L: ?Sized + Listener>(&self, topic: &Topic<L>) -> Arc<L> {
        self.inner.publisher(topic, PublishMode::Sync)
    }

    /// Publisher whose calls are only queued.
    ///
    /// Delivery happens on the calling thread at the next pump: a
    /// synchronous publish, [`MessageBus::pump_messages`], or
    /// `MessageBusConnection::deliver_immediately`. Queues belong to the
    /// posting thread, so pump before that thread exits: messages it
    /// leaves behind are only released when their connection disconnects
    /// or the bus is disposed.
    pub fn async_publisher<L: ?Sized + Listener>(&self, topic: &Topic<L>) -> Arc<L> {
        self.inner.publisher(topic, PublishMode::Async)
    }

    /// Post a prebuilt message without draining.
    pub fn post_message(&self, message: Message) {
        self.inner.post_message(&Arc::new(message));
    }

    /// Deliver a prebuilt message synchronously.
    pub fn send_message(&self, message: Message) {
        self.inner.send_message(Arc::new(message));
    }

    /// Drain every pending job in this bus's tree, root first, children
    /// depth-first.
    pub fn pump_messages(&self) {
        self.inner.pump_messages();
    }

    /// Deliver one job queued on this bus by the calling thread.
    /// Returns false if there was none.
    pub fn deliver_single_message(&self) -> bool {
        self.inner.deliver_single_message()
    }

    /// Whether a subscriber on this bus still has a message of `topic`
    /// waiting on the calling thread.
    pub fn has_undelivered_events<L: ?Sized + Listener>(&self, topic: &Topic<L>) -> bool {
        self.inner.has_undelivered_events(topic.info())
    }

    /// Number of connections subscribed to `topic` on this bus.
    pub fn subscriber_count<L: ?Sized + Listener>(&self, topic: &Topic<L>) -> usize {
        self.inner
            .subscribers_of(topic.info())
            .map_or(0, |subscribers| subscribers.len())
    }

    pub fn stats(&self) -> BusStats {
        self.inner.stats.snapshot()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Drop queued work and detach from the parent.
    ///
    /// Children are not disposed; this bus becomes the root of their
    /// subtree. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Disposable for MessageBus {
    fn dispose(&self) {
        MessageBus::dispose(self);
    }
}

impl PartialEq for MessageBus {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for MessageBus {}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("owner", &self.inner.owner)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl fmt::Display for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageBus(owner={})", self.inner.owner)
    }
}

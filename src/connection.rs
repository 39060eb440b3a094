//! Subscription endpoints.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, error, trace};

use crate::bus::{BusInner, MessageBus};
use crate::dispose::Disposable;
use crate::error::{BusError, DispatchError, HandlerError};
use crate::handler::MessageHandler;
use crate::message::Message;
use crate::queue::ThreadQueues;
use crate::topic::{Listener, Topic, TopicInfo};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of handing one message to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// The handler panicked or returned an error; logged.
    Failed,
    /// The handler does not support the method; not logged.
    Skipped,
    /// The connection is gone or no longer subscribed.
    Dropped,
}

/// Type-erased typed handler.
trait ErasedListener: Send + Sync {
    fn invoke(&self, message: &Message) -> Result<(), DispatchError>;
}

struct TypedListener<L: ?Sized + Listener>(Arc<L>);

impl<L: ?Sized + Listener> ErasedListener for TypedListener<L> {
    fn invoke(&self, message: &Message) -> Result<(), DispatchError> {
        self.0.dispatch(message.method().index, message.args())
    }
}

#[derive(Clone)]
enum Subscription {
    Listener(Arc<dyn ErasedListener>),
    /// Routed to the connection's default handler.
    Default,
}

enum InvokeError {
    Dispatch(DispatchError),
    Handler(HandlerError),
    NoDefaultHandler,
}

pub(crate) struct ConnectionInner {
    id: u64,
    bus: Weak<BusInner>,
    bus_owner: String,
    pending: ThreadQueues<Arc<Message>>,
    subscriptions: RwLock<HashMap<TopicInfo, Subscription>>,
    default_handler: RwLock<Option<Arc<dyn MessageHandler>>>,
    disconnected: AtomicBool,
}

impl ConnectionInner {
    fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    fn subscribe(self: &Arc<Self>, topic: &TopicInfo, subscription: Subscription) -> Result<(), BusError> {
        if self.is_disconnected() {
            return Err(BusError::Disconnected(self.id));
        }
        let bus = self
            .bus
            .upgrade()
            .filter(|bus| !bus.is_disposed())
            .ok_or_else(|| BusError::BusDisposed(self.bus_owner.clone()))?;

        {
            let mut subscriptions = self.subscriptions.write();
            if subscriptions.contains_key(topic) {
                return Err(BusError::DuplicateSubscription {
                    connection: self.id,
                    topic: topic.name().to_string(),
                });
            }
            subscriptions.insert(topic.clone(), subscription);
        }
        bus.add_subscriber(topic, Arc::clone(self));

        // Lost a race with disconnect: undo the registration.
        if self.is_disconnected() {
            bus.connection_terminated(self);
            return Err(BusError::Disconnected(self.id));
        }

        debug!(
            connection = self.id,
            bus = %self.bus_owner,
            topic = topic.name(),
            "subscribed"
        );
        Ok(())
    }

    /// Queue `message` for this connection on the calling thread.
    /// Returns false once disconnected.
    pub(crate) fn schedule_message_delivery(&self, message: &Arc<Message>) -> bool {
        self.pending.with_current(|queue| {
            if self.is_disconnected() {
                return false;
            }
            queue.push_back(Arc::clone(message));
            true
        })
    }

    pub(crate) fn has_pending(&self, topic: &TopicInfo) -> bool {
        self.pending.any_current(|message| message.topic() == topic)
    }

    pub(crate) fn discard_pending(&self, message: &Arc<Message>) {
        self.pending.retain(|pending| !Arc::ptr_eq(pending, message));
    }

    /// Invoke the handler subscribed to `message`'s topic.
    ///
    /// `message` must be at the head of this thread's pending queue;
    /// anything else means the queues are corrupted.
    pub(crate) fn deliver_message(&self, message: &Arc<Message>) -> Delivery {
        let head = self.pending.with_current(|queue| {
            if self.is_disconnected() {
                None
            } else {
                Some(queue.pop_front())
            }
        });
        let Some(head) = head else {
            return Delivery::Dropped;
        };
        match head {
            Some(head) if Arc::ptr_eq(&head, message) => {}
            other => panic!(
                "message queue corrupted on connection {}: delivering `{}::{}`, queue head is {:?}",
                self.id,
                message.topic().name(),
                message.method().name,
                other
            ),
        }

        let subscription = self.subscriptions.read().get(message.topic()).cloned();
        let Some(subscription) = subscription else {
            return Delivery::Dropped;
        };

        trace!(
            connection = self.id,
            topic = message.topic().name(),
            method = message.method().name,
            "delivering message"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &subscription {
            Subscription::Listener(listener) => {
                listener.invoke(message).map_err(InvokeError::Dispatch)
            }
            Subscription::Default => {
                let handler = self.default_handler.read().clone();
                match handler {
                    Some(handler) => handler.handle(message).map_err(InvokeError::Handler),
                    None => Err(InvokeError::NoDefaultHandler),
                }
            }
        }));

        match outcome {
            Ok(Ok(())) => Delivery::Delivered,
            Ok(Err(InvokeError::Handler(HandlerError::Unsupported { method }))) => {
                trace!(
                    connection = self.id,
                    topic = message.topic().name(),
                    method,
                    "handler does not support method, skipping"
                );
                Delivery::Skipped
            }
            Ok(Err(InvokeError::Handler(HandlerError::Failed(cause)))) => {
                self.log_failure(message, &cause.to_string());
                Delivery::Failed
            }
            Ok(Err(InvokeError::Dispatch(err))) => {
                self.log_failure(message, &err.to_string());
                Delivery::Failed
            }
            Ok(Err(InvokeError::NoDefaultHandler)) => {
                self.log_failure(message, "default handler is missing");
                Delivery::Failed
            }
            Err(payload) => {
                self.log_failure(message, &panic_message(payload.as_ref()));
                Delivery::Failed
            }
        }
    }

    fn log_failure(&self, message: &Message, cause: &str) {
        error!(
            connection = self.id,
            bus = %self.bus_owner,
            topic = message.topic().name(),
            method = message.method().name,
            cause,
            "listener failed while handling message"
        );
    }

    fn disconnect(self: &Arc<Self>) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pending.retain(|_| false);
        self.subscriptions.write().clear();
        self.default_handler.write().take();

        if let Some(bus) = self.bus.upgrade() {
            bus.connection_terminated(self);
        }
        debug!(connection = self.id, bus = %self.bus_owner, "disconnected");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "listener panicked".to_string()
    }
}

/// A subscription endpoint bound to one bus.
///
/// Holds at most one handler per topic. Subscriptions last until
/// [`MessageBusConnection::disconnect`] is called (directly, through
/// [`Disposable::dispose`], or by the scope given to
/// `MessageBus::connect_in`). Clones refer to the same connection.
///
/// ## Example
///
/// ```ignore
/// let connection = bus.connect();
/// let handler: Arc<dyn FileListener> = Arc::new(Indexer::default());
/// connection.subscribe(&FILES, handler)?;
///
/// // later
/// connection.disconnect();
/// ```
#[derive(Clone)]
pub struct MessageBusConnection {
    inner: Arc<ConnectionInner>,
}

impl MessageBusConnection {
    pub(crate) fn new(bus: &Arc<BusInner>) -> Self {
        let inner = Arc::new(ConnectionInner {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            bus: Arc::downgrade(bus),
            bus_owner: bus.owner().to_string(),
            pending: ThreadQueues::new(),
            subscriptions: RwLock::new(HashMap::new()),
            default_handler: RwLock::new(None),
            disconnected: AtomicBool::new(false),
        });
        debug!(connection = inner.id, bus = %inner.bus_owner, "connected");
        Self { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The bus this connection belongs to, if it still exists.
    pub fn bus(&self) -> Option<MessageBus> {
        self.inner.bus.upgrade().map(MessageBus::from_inner)
    }

    /// Route messages of `topic` to `handler`.
    ///
    /// Fails with [`BusError::DuplicateSubscription`] if this connection
    /// already handles `topic`.
    pub fn subscribe<L: ?Sized + Listener>(&self, topic: &Topic<L>, handler: Arc<L>) -> Result<(), BusError> {
        let listener: Arc<dyn ErasedListener> = Arc::new(TypedListener(handler));
        self.inner
            .subscribe(topic.info(), Subscription::Listener(listener))
    }

    /// Route messages of `topic` to the default handler.
    ///
    /// Fails with [`BusError::NoDefaultHandler`] unless
    /// [`MessageBusConnection::set_default_handler`] was called first.
    pub fn subscribe_default<L: ?Sized + Listener>(&self, topic: &Topic<L>) -> Result<(), BusError> {
        if self.inner.default_handler.read().is_none() {
            return Err(BusError::NoDefaultHandler {
                connection: self.inner.id,
                topic: topic.name().to_string(),
            });
        }
        self.inner.subscribe(topic.info(), Subscription::Default)
    }

    /// Install the handler used by [`MessageBusConnection::subscribe_default`].
    pub fn set_default_handler(&self, handler: impl MessageHandler + 'static) {
        *self.inner.default_handler.write() = Some(Arc::new(handler));
    }

    /// Deliver everything pending for this connection on the calling
    /// thread, one bus job at a time.
    pub fn deliver_immediately(&self) {
        let Some(bus) = self.inner.bus.upgrade() else {
            return;
        };
        while !self.inner.pending.is_empty_current() {
            if !bus.deliver_single_message() {
                break;
            }
        }
    }

    /// Unsubscribe from every topic and drop pending messages. Idempotent.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    pub fn is_disconnected(&self) -> bool {
        self.inner.is_disconnected()
    }
}

impl Disposable for MessageBusConnection {
    fn dispose(&self) {
        self.disconnect();
    }
}

impl fmt::Debug for MessageBusConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBusConnection")
            .field("id", &self.inner.id)
            .field("bus", &self.inner.bus_owner)
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}

impl fmt::Display for MessageBusConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection {} on {}", self.inner.id, self.inner.bus_owner)
    }
}

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Listener;

static NEXT_TOPIC_ID: AtomicU64 = AtomicU64::new(1);

/// Where a message posted on a bus travels besides that bus itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BroadcastDirection {
    /// Stay on the originating bus.
    None,
    /// Also post to every child bus, transitively.
    #[default]
    ToChildren,
    /// Also post to the parent bus, transitively.
    ToParent,
}

struct TopicMeta {
    id: u64,
    name: String,
    listener: &'static str,
    direction: BroadcastDirection,
}

/// Untyped view of a topic, as carried by messages and used as the
/// registry key.
///
/// Equality and hashing use the topic's identity only.
#[derive(Clone)]
pub struct TopicInfo(Arc<TopicMeta>);

impl TopicInfo {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Display name given at creation.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Name of the listener trait.
    pub fn listener_name(&self) -> &'static str {
        self.0.listener
    }

    pub fn direction(&self) -> BroadcastDirection {
        self.0.direction
    }
}

impl PartialEq for TopicInfo {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for TopicInfo {}

impl Hash for TopicInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for TopicInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("listener", &self.0.listener)
            .field("direction", &self.0.direction)
            .finish()
    }
}

impl fmt::Display for TopicInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0.name, self.0.listener)
    }
}

/// A bus channel whose subscribers implement the listener shape `L`.
///
/// Topics are compared by identity: two topics created separately are
/// different channels even when they share a name. Clones refer to the
/// same channel.
///
/// ## Example
///
/// ```ignore
/// #[message_bus::listener]
/// pub trait BuildListener {
///     fn finished(&self, target: String, ok: bool);
/// }
///
/// let topic: Topic<dyn BuildListener> = Topic::new("build");
/// ```
pub struct Topic<L: ?Sized + Listener> {
    info: TopicInfo,
    _shape: PhantomData<fn(&L)>,
}

impl<L: ?Sized + Listener> Topic<L> {
    /// Create a topic broadcasting to child buses.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_direction(name, BroadcastDirection::default())
    }

    /// Create a topic with an explicit broadcast direction.
    pub fn with_direction(name: impl Into<String>, direction: BroadcastDirection) -> Self {
        let meta = TopicMeta {
            id: NEXT_TOPIC_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            listener: L::NAME,
            direction,
        };
        Self {
            info: TopicInfo(Arc::new(meta)),
            _shape: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn direction(&self) -> BroadcastDirection {
        self.info.direction()
    }

    /// Untyped view of this topic.
    pub fn info(&self) -> &TopicInfo {
        &self.info
    }
}

impl<L: ?Sized + Listener> Clone for Topic<L> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            _shape: PhantomData,
        }
    }
}

impl<L: ?Sized + Listener> PartialEq for Topic<L> {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}

impl<L: ?Sized + Listener> Eq for Topic<L> {}

impl<L: ?Sized + Listener> Hash for Topic<L> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.info.hash(state);
    }
}

impl<L: ?Sized + Listener> fmt::Debug for Topic<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.info, f)
    }
}

impl<L: ?Sized + Listener> fmt::Display for Topic<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.info, f)
    }
}

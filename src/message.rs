//! Messages: one listener method call in flight on a bus.

use std::any::Any;
use std::fmt;

use crate::topic::{MethodDescriptor, TopicInfo};

/// A positional message argument.
pub type Arg = Box<dyn Any + Send + Sync>;

/// An immutable record of a listener call: topic, method and arguments.
///
/// Created by publisher proxies at publish time and shared between every
/// connection it is delivered to.
pub struct Message {
    topic: TopicInfo,
    method: &'static MethodDescriptor,
    args: Vec<Arg>,
}

impl Message {
    pub fn new(topic: TopicInfo, method: &'static MethodDescriptor, args: Vec<Arg>) -> Self {
        Self {
            topic,
            method,
            args,
        }
    }

    pub fn topic(&self) -> &TopicInfo {
        &self.topic
    }

    pub fn method(&self) -> &'static MethodDescriptor {
        self.method
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Argument at `position`, if present and of type `T`.
    pub fn arg<T: 'static>(&self, position: usize) -> Option<&T> {
        self.args
            .get(position)
            .and_then(|arg| (**arg).downcast_ref::<T>())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("topic", &self.topic.name())
            .field("method", &self.method.name)
            .field("args", &self.args.len())
            .finish()
    }
}

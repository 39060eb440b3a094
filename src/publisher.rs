//! Publishing side of a topic: the sink behind generated publisher proxies.

use std::sync::{Arc, Weak};

use tracing::{error, warn};

use crate::bus::BusInner;
use crate::message::{Arg, Message};
use crate::topic::{MethodDescriptor, TopicInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PublishMode {
    /// Pump, post, pump: delivered before the call returns.
    Sync,
    /// Post only; delivered by a later pump.
    Async,
}

/// Turns listener method calls into messages on one bus and topic.
///
/// Every proxy generated by `#[message_bus::listener]` owns one of these.
/// The bus is held weakly: calls made after the bus is gone are dropped.
pub struct Publisher {
    bus: Weak<BusInner>,
    topic: TopicInfo,
    methods: &'static [MethodDescriptor],
    mode: PublishMode,
}

impl Publisher {
    pub(crate) fn new(
        bus: Weak<BusInner>,
        topic: TopicInfo,
        methods: &'static [MethodDescriptor],
        mode: PublishMode,
    ) -> Self {
        Self {
            bus,
            topic,
            methods,
            mode,
        }
    }

    /// Publish a call of method `method` with positional `args`.
    pub fn publish(&self, method: usize, args: Vec<Arg>) {
        let Some(descriptor) = self.methods.get(method) else {
            error!(
                topic = self.topic.name(),
                index = method,
                "publisher called with an unknown method index"
            );
            return;
        };

        let Some(bus) = self.bus.upgrade() else {
            warn!(
                topic = self.topic.name(),
                method = descriptor.name,
                "message bus is gone, dropping message"
            );
            return;
        };

        let message = Arc::new(Message::new(self.topic.clone(), descriptor, args));
        match self.mode {
            PublishMode::Sync => bus.send_message(message),
            PublishMode::Async => bus.post_message(&message),
        }
    }
}

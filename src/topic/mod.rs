//! Topics and listener shapes.
//!
//! A [`Topic`] names one bus channel. It is typed by its listener shape,
//! a trait annotated with `#[message_bus::listener]`, and carries the
//! [`BroadcastDirection`] used when a message is posted on a bus that has
//! parents or children.

mod listener;
mod topic;

pub use listener::{Listener, MethodDescriptor};
pub use topic::{BroadcastDirection, Topic, TopicInfo};

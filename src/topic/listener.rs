use std::sync::Arc;

use crate::error::DispatchError;
use crate::message::Arg;
use crate::publisher::Publisher;

/// One invocable method of a listener shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Position of the method in declaration order.
    pub index: usize,
    pub name: &'static str,
    /// Number of arguments, not counting the receiver.
    pub arity: usize,
}

/// A listener shape: the set of methods a topic's subscribers implement.
///
/// Implemented for `dyn Trait` by `#[message_bus::listener]`; not meant to
/// be implemented by hand.
pub trait Listener: Send + Sync + 'static {
    /// Name of the listener trait.
    const NAME: &'static str;

    /// Method table, indexed by [`MethodDescriptor::index`].
    fn methods() -> &'static [MethodDescriptor];

    /// Invoke method `method` on this handler with positional `args`.
    fn dispatch(&self, method: usize, args: &[Arg]) -> Result<(), DispatchError>;

    /// Build a publisher proxy whose method calls are sent through `sink`.
    fn publisher(sink: Publisher) -> Arc<Self>;

    /// Look up a method by name.
    fn method(name: &str) -> Option<&'static MethodDescriptor> {
        Self::methods().iter().find(|m| m.name == name)
    }
}

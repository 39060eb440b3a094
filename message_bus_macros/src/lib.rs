mod listener;

use proc_macro::TokenStream;

// ============================================================================
// #[listener] attribute macro
// ============================================================================

/// Attribute macro that turns a trait into a bus listener shape.
///
/// The annotated trait describes the methods a topic's subscribers
/// implement. The macro keeps the trait (adding `Send + Sync` supertraits)
/// and generates, for `dyn Trait`:
///
/// - the method table (`MethodDescriptor` per method, in declaration order),
/// - `dispatch`, which downcasts a message's positional arguments and calls
///   the matching trait method,
/// - a publisher proxy implementing the trait, where every call becomes a
///   message posted to the bus.
///
/// # Usage
///
/// ```ignore
/// #[message_bus::listener]
/// pub trait FileListener {
///     fn saved(&self, path: String);
///     fn renamed(&self, from: String, to: String);
///
///     // Added later: handlers written before it existed keep compiling
///     // and simply ignore it.
///     #[optional]
///     fn reloaded(&self, path: String);
/// }
///
/// let topic: Topic<dyn FileListener> = Topic::with_direction("files", BroadcastDirection::ToChildren);
/// bus.sync_publisher(&topic).saved("a.txt".to_string());
/// ```
///
/// Restrictions:
/// - methods take `&self` and return `()`
/// - no generic parameters on the trait or its methods
/// - argument types must be `Clone + Send + Sync + 'static`
/// - `#[optional]` methods must not have a body; they get an empty one
#[proc_macro_attribute]
pub fn listener(attr: TokenStream, item: TokenStream) -> TokenStream {
    listener::expand_listener(attr, item)
}

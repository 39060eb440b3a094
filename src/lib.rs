//! In-process publish/subscribe message bus.
//!
//! Components publish typed events on [`Topic`]s; subscribers register
//! handlers per topic through a [`MessageBusConnection`]. Buses form a
//! parent/child tree and a topic's [`BroadcastDirection`] decides whether
//! a message also travels to child buses or to the parent.
//!
//! Delivery always runs on the publishing thread. A synchronous publisher
//! returns only after every reachable subscriber has run; an asynchronous
//! publisher queues the message for the next pump. Ordering is FIFO per
//! publishing thread.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use message_bus::{listener, MessageBus, Topic};
//!
//! #[listener]
//! pub trait SaveListener {
//!     fn saved(&self, path: String);
//! }
//!
//! struct Indexer;
//!
//! impl SaveListener for Indexer {
//!     fn saved(&self, path: String) {
//!         println!("reindex {}", path);
//!     }
//! }
//!
//! let saves: Topic<dyn SaveListener> = Topic::new("saves");
//! let app = MessageBus::new("application");
//! let project = MessageBus::with_parent("project", &app);
//!
//! let connection = project.connect();
//! let handler: Arc<dyn SaveListener> = Arc::new(Indexer);
//! connection.subscribe(&saves, handler)?;
//!
//! app.sync_publisher(&saves).saved("src/main.rs".to_string());
//! ```

extern crate self as message_bus;

mod bus;
mod connection;
mod dispose;
mod error;
mod handler;
mod message;
mod publisher;
mod queue;
mod topic;

pub use bus::{BusStats, MessageBus};
pub use connection::MessageBusConnection;
pub use dispose::{Disposable, Disposer};
pub use error::{BusError, DispatchError, HandlerError};
pub use handler::MessageHandler;
pub use message::{Arg, Message};
pub use publisher::Publisher;
pub use topic::{BroadcastDirection, Listener, MethodDescriptor, Topic, TopicInfo};

pub use message_bus_macros::listener;

/// Support code for `#[listener]` expansions.
#[doc(hidden)]
pub mod __private {
    use crate::error::DispatchError;
    use crate::message::Arg;

    pub fn check_arity(
        listener: &'static str,
        method: &'static str,
        expected: usize,
        args: &[Arg],
    ) -> Result<(), DispatchError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(DispatchError::ArityMismatch {
                listener,
                method,
                expected,
                actual: args.len(),
            })
        }
    }

    pub fn downcast_arg<'a, T: 'static>(
        listener: &'static str,
        method: &'static str,
        args: &'a [Arg],
        position: usize,
    ) -> Result<&'a T, DispatchError> {
        args.get(position)
            .and_then(|arg| (**arg).downcast_ref::<T>())
            .ok_or(DispatchError::ArgumentType {
                listener,
                method,
                position,
                expected: std::any::type_name::<T>(),
            })
    }
}

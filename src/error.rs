//! Error types for bus operations and listener dispatch.

use thiserror::Error;

/// Errors surfaced to callers of the bus and connection APIs.
///
/// These are programmer errors: nothing here is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The connection already has a handler for this topic.
    #[error("connection {connection} is already subscribed to topic `{topic}`")]
    DuplicateSubscription { connection: u64, topic: String },
    /// `subscribe_default` was called before `set_default_handler`.
    #[error("connection {connection} has no default handler to subscribe topic `{topic}` with")]
    NoDefaultHandler { connection: u64, topic: String },
    /// The connection was disconnected.
    #[error("connection {0} is disconnected")]
    Disconnected(u64),
    /// The bus the connection belongs to has been disposed or dropped.
    #[error("message bus `{0}` is disposed")]
    BusDisposed(String),
}

/// Result returned by a default (untyped) message handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler predates this method and does not implement it.
    /// Delivery skips it without logging.
    #[error("`{method}` is not supported by this handler")]
    Unsupported { method: &'static str },
    /// The handler failed. Delivery logs it and carries on.
    #[error("handler failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap any error as a handler failure.
    pub fn failed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        HandlerError::Failed(err.into())
    }
}

/// Errors raised by generated listener dispatch when a message does not
/// match the listener shape it was routed to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("`{listener}` has no method with index {index}")]
    UnknownMethod { listener: &'static str, index: usize },
    #[error("`{listener}::{method}` takes {expected} argument(s), message carries {actual}")]
    ArityMismatch {
        listener: &'static str,
        method: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("argument {position} of `{listener}::{method}` is not a `{expected}`")]
    ArgumentType {
        listener: &'static str,
        method: &'static str,
        position: usize,
        expected: &'static str,
    },
}

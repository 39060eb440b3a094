//! Untyped fallback handler for connections.

use crate::error::HandlerError;
use crate::message::Message;

/// A handler that receives messages of any topic as raw [`Message`]s.
///
/// Installed with `MessageBusConnection::set_default_handler` and bound to
/// topics with `subscribe_default`. Returning
/// [`HandlerError::Unsupported`] marks a method the handler deliberately
/// does not know about; delivery skips it quietly.
///
/// Closures taking `&Message` implement this trait:
///
/// ```ignore
/// connection.set_default_handler(|message: &Message| {
///     tracing::info!(method = message.method().name, "seen");
///     Ok(())
/// });
/// ```
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        self(message)
    }
}

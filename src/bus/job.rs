use std::sync::Arc;

use crate::connection::{ConnectionInner, Delivery};
use crate::message::Message;

/// One message waiting to be handed to one connection.
pub(crate) struct DeliveryJob {
    pub(crate) connection: Arc<ConnectionInner>,
    pub(crate) message: Arc<Message>,
}

impl DeliveryJob {
    pub(crate) fn new(connection: Arc<ConnectionInner>, message: Arc<Message>) -> Self {
        Self {
            connection,
            message,
        }
    }

    pub(crate) fn deliver(self) -> Delivery {
        self.connection.deliver_message(&self.message)
    }

    pub(crate) fn targets(&self, connection: &Arc<ConnectionInner>) -> bool {
        Arc::ptr_eq(&self.connection, connection)
    }
}

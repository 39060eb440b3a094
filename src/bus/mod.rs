//! Message bus: topic registry, fan-out and draining.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  publisher ───▶ │ MessageBus (root)            │
//!  proxy          │  subscribers: topic → conns  │
//!                 │  jobs: per-thread FIFO       │
//!                 └──────────────────────────────┘
//!                   │ TO_CHILDREN        ▲ TO_PARENT
//!                   ▼                    │
//!                 ┌──────────────────────────────┐
//!                 │ MessageBus (child)           │──▶ connection ──▶ handler
//!                 └──────────────────────────────┘
//! ```
//!
//! Posting a message queues one [`DeliveryJob`] per subscribed connection
//! on the bus's job queue and one pending message on the connection. A
//! pump drains job queues from the root down, depth-first, and each job
//! asks its connection to invoke the handler.
//!
//! ## Usage
//!
//! ```ignore
//! let root = MessageBus::new("application");
//! let module = MessageBus::with_parent("module", &root);
//!
//! let connection = module.connect();
//! connection.subscribe(&topic, handler)?;
//!
//! // Delivered to `handler` before `saved` returns.
//! root.sync_publisher(&topic).saved("a.txt".to_string());
//! ```

mod bus;
mod job;
mod stats;

pub use bus::MessageBus;
pub use stats::BusStats;

pub(crate) use bus::BusInner;
pub(crate) use job::DeliveryJob;

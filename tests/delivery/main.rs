//! Delivery integration tests.
//!
//! Covers how messages reach subscribers on a single bus:
//! - FIFO order and synchronous versus deferred publishing
//! - Default handlers and listener failures
//! - Publishing from several threads

mod failures;

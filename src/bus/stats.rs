use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::connection::Delivery;

/// Counters for one bus.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BusStats {
    /// Messages posted on this bus, including ones broadcast from a
    /// parent or child.
    pub posted: u64,
    /// Handler invocations that completed.
    pub delivered: u64,
    /// Handler invocations that panicked or returned an error.
    pub failed: u64,
    /// Invocations skipped because the handler does not support the method.
    pub skipped: u64,
}

#[cfg(feature = "serde")]
impl BusStats {
    /// Render the counters as a JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    posted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_post(&self) {
        self.posted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, delivery: Delivery) {
        let counter = match delivery {
            Delivery::Delivered => &self.delivered,
            Delivery::Failed => &self.failed,
            Delivery::Skipped => &self.skipped,
            Delivery::Dropped => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BusStats {
        BusStats {
            posted: self.posted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

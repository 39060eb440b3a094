//! Per-thread FIFO queues.
//!
//! Buses and connections keep one queue per publishing thread so that two
//! threads publishing at the same time never interleave each other's
//! delivery order.

use std::collections::{HashMap, VecDeque};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

pub(crate) struct ThreadQueues<T> {
    queues: Mutex<HashMap<ThreadId, VecDeque<T>>>,
}

impl<T> ThreadQueues<T> {
    pub(crate) fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` against the calling thread's queue.
    ///
    /// Empty queues are dropped from the map afterwards.
    pub(crate) fn with_current<R>(&self, f: impl FnOnce(&mut VecDeque<T>) -> R) -> R {
        let id = thread::current().id();
        let mut queues = self.queues.lock();
        let queue = queues.entry(id).or_default();
        let result = f(queue);
        if queue.is_empty() {
            queues.remove(&id);
        }
        result
    }

    pub(crate) fn push(&self, item: T) {
        self.with_current(|queue| queue.push_back(item));
    }

    pub(crate) fn pop_front(&self) -> Option<T> {
        self.with_current(|queue| queue.pop_front())
    }

    pub(crate) fn is_empty_current(&self) -> bool {
        let id = thread::current().id();
        !self.queues.lock().contains_key(&id)
    }

    pub(crate) fn any_current(&self, mut pred: impl FnMut(&T) -> bool) -> bool {
        let id = thread::current().id();
        self.queues
            .lock()
            .get(&id)
            .map_or(false, |queue| queue.iter().any(|item| pred(item)))
    }

    /// Keep only matching items, across every thread.
    pub(crate) fn retain(&self, mut keep: impl FnMut(&T) -> bool) {
        let mut queues = self.queues.lock();
        queues.retain(|_, queue| {
            queue.retain(|item| keep(item));
            !queue.is_empty()
        });
    }

    /// Take every queued item, across every thread.
    pub(crate) fn drain(&self) -> Vec<T> {
        let queues = std::mem::take(&mut *self.queues.lock());
        queues.into_values().flatten().collect()
    }
}

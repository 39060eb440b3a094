//! Lifecycle hooks supplied by a host container.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

/// Something that can be torn down by a [`Disposer`].
pub trait Disposable: Send + Sync {
    /// Release resources. Must be safe to call more than once.
    fn dispose(&self);
}

/// A disposal scope: disposes everything registered with it, in reverse
/// registration order, when it is disposed or dropped.
///
/// ## Example
///
/// ```ignore
/// let project = Disposer::new("project");
/// let connection = bus.connect_in(&project);
/// connection.subscribe(&topic, handler)?;
///
/// project.dispose(); // disconnects `connection`
/// ```
pub struct Disposer {
    name: String,
    children: Mutex<Vec<Box<dyn Disposable>>>,
    disposed: AtomicBool,
}

impl Disposer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tie `child` to this scope. Registering on a scope that is already
    /// disposed disposes `child` right away.
    pub fn register(&self, child: impl Disposable + 'static) {
        if self.is_disposed() {
            debug!(scope = %self.name, "scope already disposed, disposing child now");
            child.dispose();
            return;
        }
        self.children.lock().push(Box::new(child));
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Dispose every registered child, last registered first. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let children = std::mem::take(&mut *self.children.lock());
        debug!(scope = %self.name, children = children.len(), "disposing scope");
        for child in children.into_iter().rev() {
            child.dispose();
        }
    }
}

impl Disposable for Disposer {
    fn dispose(&self) {
        Disposer::dispose(self);
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        Disposer::dispose(self);
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("name", &self.name)
            .field("children", &self.children.lock().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

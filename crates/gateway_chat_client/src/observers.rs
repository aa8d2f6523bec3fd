//! Append-only observer lists with panic isolation.

use std::panic::{self, AssertUnwindSafe};

type Handler<T> = Box<dyn FnMut(&T) + Send>;

/// Ordered callbacks for one kind of notification.
pub(crate) struct Observers<T: ?Sized> {
    kind: &'static str,
    handlers: Vec<Handler<T>>,
}

impl<T: ?Sized> Observers<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            handlers: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, handler: Handler<T>) {
        self.handlers.push(handler);
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Call every handler in registration order. A panicking handler is
    /// logged and skipped; the rest still run.
    pub(crate) fn notify(&mut self, value: &T) {
        for (index, handler) in self.handlers.iter_mut().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                tracing::warn!(observer = self.kind, index, "Observer panicked; continuing dispatch");
            }
        }
    }
}

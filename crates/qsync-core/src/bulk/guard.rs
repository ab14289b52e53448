//! RAII counter for work in flight.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Increments `count` on entry and decrements it when dropped, including
/// when the owning future is cancelled.
pub(crate) struct InFlightGuard<'a> {
    count: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    pub(crate) fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self { count }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

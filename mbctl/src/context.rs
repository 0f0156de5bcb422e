//! Marks the caller's latency-critical dispatch thread.
//!
//! Every daemon call blocks on socket I/O. An application with a
//! single-threaded event loop enters a [`DispatchContext`] on that thread;
//! any daemon call made while the guard is alive fails immediately with
//! [`Error::ThreadingViolation`] instead of stalling the loop.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::error::{Error, Result};

thread_local! {
    static IN_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

/// Guard marking the current thread as the dispatch context.
///
/// Not `Send`: the mark belongs to the thread that created it.
#[derive(Debug)]
#[must_use = "the thread is only marked while the guard is alive"]
pub struct DispatchContext {
    /// Value to restore on drop, so guards nest.
    prev: bool,
    /// Pins the guard to its thread.
    _not_send: PhantomData<*const ()>,
}

impl DispatchContext {
    /// Marks the current thread until the guard is dropped.
    pub fn enter() -> Self {
        let prev = IN_DISPATCH.with(|c| c.replace(true));
        Self {
            prev,
            _not_send: PhantomData,
        }
    }

    /// Returns `true` if the current thread is marked.
    pub fn is_current() -> bool {
        IN_DISPATCH.with(Cell::get)
    }
}

impl Drop for DispatchContext {
    fn drop(&mut self) {
        IN_DISPATCH.with(|c| c.set(self.prev));
    }
}

/// Fails with [`Error::ThreadingViolation`] on a marked thread.
pub(crate) fn ensure_blocking_allowed(op: &'static str) -> Result<()> {
    if DispatchContext::is_current() {
        return Err(Error::ThreadingViolation { op });
    }
    Ok(())
}

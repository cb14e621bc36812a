//! Single-slot request mailbox.
//!
//! Both state machines accept external state requests through exactly
//! one pending slot: a new request overwrites whatever is waiting, and
//! the machine's own trigger consumes (clears) the slot atomically on
//! its next tick. This mirrors the source's "request inbox" idiom
//! (§9 Design Notes) without a queue or heap allocation; the short
//! critical section that used to be `taskENTER_CRITICAL`/`EXIT_CRITICAL`
//! around the slot is now a `parking_lot::Mutex`.

use parking_lot::Mutex;

/// A single-slot inbox for one pending request of type `T`.
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Mailbox<T> {
    pub const fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    /// Post a request, overwriting any request that has not yet been
    /// consumed. Returns `true` if a pending request was displaced.
    pub fn post(&self, request: T) -> bool {
        let mut slot = self.slot.lock();
        let displaced = slot.is_some();
        *slot = Some(request);
        displaced
    }

    /// Atomically take and clear the pending request, if any.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Whether a request is currently pending.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

//! Cooperative thread interruption.
//!
//! Channels block inside interruptible lock acquisitions. To unblock such a
//! thread from outside, two signals exist: `interrupt()` (sets the thread's
//! interrupted flag, then wakes it) and `wake()` (wakes it without touching
//! the flag). Channel close uses the latter, which is what lets the channel
//! epilogue tell an asynchronous close apart from a delivered interrupt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Interrupt status of one thread, shared as `Arc<InterruptStatus>`.
///
/// While a thread waits inside an interruptible acquisition it registers the
/// condvar it is parked on, so both signals can notify the right waiter
/// immediately instead of relying on the wait-loop poll alone.
#[derive(Debug)]
pub struct InterruptStatus {
    interrupted: AtomicBool,
    waiting_on: Mutex<Option<Arc<Condvar>>>,
}

impl InterruptStatus {
    fn new() -> Self {
        Self {
            interrupted: AtomicBool::new(false),
            waiting_on: Mutex::new(None),
        }
    }

    /// Set the interrupted flag and wake the thread if it is parked.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
        self.wake();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn clear(&self) -> bool {
        self.interrupted.swap(false, Ordering::AcqRel)
    }

    /// Re-assert the flag without waking anyone.
    pub(crate) fn set(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    /// Consume the flag inside a wait loop.
    pub(crate) fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::AcqRel)
    }

    /// Wake the thread without setting the interrupted flag.
    pub(crate) fn wake(&self) {
        if let Some(cond) = self.waiting_on.lock().unwrap().as_ref() {
            cond.notify_all();
        }
    }

    pub(crate) fn begin_wait(&self, cond: &Arc<Condvar>) {
        *self.waiting_on.lock().unwrap() = Some(Arc::clone(cond));
    }

    pub(crate) fn end_wait(&self) {
        *self.waiting_on.lock().unwrap() = None;
    }
}

thread_local! {
    static CURRENT: Arc<InterruptStatus> = Arc::new(InterruptStatus::new());
}

/// Interrupt status of the calling thread. Hand the returned `Arc` to another
/// thread to let it interrupt this one.
pub fn current() -> Arc<InterruptStatus> {
    CURRENT.with(Arc::clone)
}

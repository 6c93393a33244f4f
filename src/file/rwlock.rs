//! A data-owning reader/writer lock with interruptible acquisition.
//!
//! Channels must be able to unblock a thread that is waiting for a file's
//! lock when the channel is closed or the thread is interrupted, which rules
//! out `std::sync::RwLock`. Waits here poll two abort signals between condvar
//! wakeups: the caller's interrupt flag and the owning channel's open flag.
//! Unlock, interrupt delivery and channel close all notify the condvar; a
//! bounded `wait_timeout` is the backstop for lost races.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::interrupt::InterruptStatus;

const WAIT_POLL: Duration = Duration::from_millis(10);

/// Why an interruptible acquisition was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unblocked {
    /// The waiting thread's interrupt flag was set (and has been consumed).
    Interrupted,
    /// The owning channel was closed while waiting.
    ChannelClosed,
}

/// Signals an interruptible acquisition watches while it waits.
pub struct BlockingCtx<'a> {
    pub status: &'a InterruptStatus,
    pub open: &'a AtomicBool,
}

pub struct InterruptibleRwLock<T> {
    state: Mutex<RwState>,
    cond: Arc<Condvar>,
    data: UnsafeCell<T>,
}

// The lock protocol guarantees exclusive &mut access through the write guard
// and shared & access through read guards.
unsafe impl<T: Send> Send for InterruptibleRwLock<T> {}
unsafe impl<T: Send + Sync> Sync for InterruptibleRwLock<T> {}

impl<T> std::fmt::Debug for InterruptibleRwLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptibleRwLock").finish_non_exhaustive()
    }
}

struct RwState {
    readers: usize,
    writer: bool,
}

impl<T> InterruptibleRwLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: Mutex::new(RwState {
                readers: 0,
                writer: false,
            }),
            cond: Arc::new(Condvar::new()),
            data: UnsafeCell::new(data),
        }
    }

    /// Blocking shared acquisition, not interruptible. Maintenance paths
    /// only; channel operations go through [`read_interruptibly`].
    ///
    /// [`read_interruptibly`]: Self::read_interruptibly
    pub fn read(&self) -> RwReadGuard<'_, T> {
        let mut st = self.state.lock().unwrap();
        while st.writer {
            st = self.cond.wait(st).unwrap();
        }
        st.readers += 1;
        RwReadGuard { lock: self }
    }

    /// Blocking exclusive acquisition, not interruptible.
    pub fn write(&self) -> RwWriteGuard<'_, T> {
        let mut st = self.state.lock().unwrap();
        while st.writer || st.readers > 0 {
            st = self.cond.wait(st).unwrap();
        }
        st.writer = true;
        RwWriteGuard { lock: self }
    }

    /// Shared acquisition that abandons the wait when the calling thread is
    /// interrupted or the owning channel closes.
    pub fn read_interruptibly(&self, ctx: &BlockingCtx<'_>) -> Result<RwReadGuard<'_, T>, Unblocked> {
        let _waiting = WaitRegistration::new(ctx.status, &self.cond);
        let mut st = self.state.lock().unwrap();
        loop {
            if ctx.status.take_interrupt() {
                return Err(Unblocked::Interrupted);
            }
            if !ctx.open.load(Ordering::Acquire) {
                return Err(Unblocked::ChannelClosed);
            }
            if !st.writer {
                st.readers += 1;
                return Ok(RwReadGuard { lock: self });
            }
            st = self.cond.wait_timeout(st, WAIT_POLL).unwrap().0;
        }
    }

    /// Exclusive acquisition that abandons the wait when the calling thread
    /// is interrupted or the owning channel closes.
    pub fn write_interruptibly(
        &self,
        ctx: &BlockingCtx<'_>,
    ) -> Result<RwWriteGuard<'_, T>, Unblocked> {
        let _waiting = WaitRegistration::new(ctx.status, &self.cond);
        let mut st = self.state.lock().unwrap();
        loop {
            if ctx.status.take_interrupt() {
                return Err(Unblocked::Interrupted);
            }
            if !ctx.open.load(Ordering::Acquire) {
                return Err(Unblocked::ChannelClosed);
            }
            if !st.writer && st.readers == 0 {
                st.writer = true;
                return Ok(RwWriteGuard { lock: self });
            }
            st = self.cond.wait_timeout(st, WAIT_POLL).unwrap().0;
        }
    }
}

/// RAII registration of "this thread is parked on that condvar" with its
/// interrupt status, so interrupts and close can wake it promptly.
struct WaitRegistration<'a> {
    status: &'a InterruptStatus,
}

impl<'a> WaitRegistration<'a> {
    fn new(status: &'a InterruptStatus, cond: &Arc<Condvar>) -> Self {
        status.begin_wait(cond);
        Self { status }
    }
}

impl Drop for WaitRegistration<'_> {
    fn drop(&mut self) {
        self.status.end_wait();
    }
}

pub struct RwReadGuard<'a, T> {
    lock: &'a InterruptibleRwLock<T>,
}

impl<T> Deref for RwReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for RwReadGuard<'_, T> {
    fn drop(&mut self) {
        let mut st = self.lock.state.lock().unwrap();
        st.readers -= 1;
        drop(st);
        self.lock.cond.notify_all();
    }
}

pub struct RwWriteGuard<'a, T> {
    lock: &'a InterruptibleRwLock<T>,
}

impl<T> Deref for RwWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for RwWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for RwWriteGuard<'_, T> {
    fn drop(&mut self) {
        let mut st = self.lock.state.lock().unwrap();
        st.writer = false;
        drop(st);
        self.lock.cond.notify_all();
    }
}

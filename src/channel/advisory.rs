//! Advisory byte-range locks.
//!
//! The filesystem is in-process, so there is no second process to contend
//! with: lock requests are granted immediately and never enforced against
//! concurrent I/O. The record only tracks validity.

use std::sync::atomic::{AtomicBool, Ordering};

/// A granted byte-range lock. Valid from creation until [`release`] or until
/// the issuing channel closes.
///
/// [`release`]: AdvisoryLock::release
pub struct AdvisoryLock {
    position: u64,
    size: u64,
    shared: bool,
    valid: AtomicBool,
}

impl AdvisoryLock {
    pub(crate) fn new(position: u64, size: u64, shared: bool) -> Self {
        Self {
            position,
            size,
            shared,
            valid: AtomicBool::new(true),
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Invalidate the lock. Releasing twice is a no-op.
    pub fn release(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

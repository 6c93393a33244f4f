//! The metadata record the I/O core consumes.
//!
//! Attribute views (basic/owner/posix/unix) live outside this crate; they
//! read and write this record. The core itself only touches timestamps.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamps and ownership of one file, millisecond precision.
#[derive(Debug)]
pub struct FileMetadata {
    created_ms: AtomicU64,
    accessed_ms: AtomicU64,
    modified_ms: AtomicU64,
    uid: AtomicU32,
    gid: AtomicU32,
    mode: AtomicU32,
}

impl FileMetadata {
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            created_ms: AtomicU64::new(now),
            accessed_ms: AtomicU64::new(now),
            modified_ms: AtomicU64::new(now),
            uid: AtomicU32::new(0),
            gid: AtomicU32::new(0),
            mode: AtomicU32::new(0o644),
        }
    }

    pub fn creation_time_millis(&self) -> u64 {
        self.created_ms.load(Ordering::Acquire)
    }

    pub fn access_time_millis(&self) -> u64 {
        self.accessed_ms.load(Ordering::Acquire)
    }

    pub fn modified_time_millis(&self) -> u64 {
        self.modified_ms.load(Ordering::Acquire)
    }

    pub fn update_access_time(&self) {
        self.accessed_ms.store(now_millis(), Ordering::Release);
    }

    pub fn update_modified_time(&self) {
        self.modified_ms.store(now_millis(), Ordering::Release);
    }

    pub fn uid(&self) -> u32 {
        self.uid.load(Ordering::Acquire)
    }

    pub fn set_uid(&self, uid: u32) {
        self.uid.store(uid, Ordering::Release);
    }

    pub fn gid(&self) -> u32 {
        self.gid.load(Ordering::Acquire)
    }

    pub fn set_gid(&self, gid: u32) {
        self.gid.store(gid, Ordering::Release);
    }

    pub fn mode(&self) -> u32 {
        self.mode.load(Ordering::Acquire)
    }

    pub fn set_mode(&self, mode: u32) {
        self.mode.store(mode, Ordering::Release);
    }
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metadata_has_consistent_times() {
        let meta = FileMetadata::new();
        assert_eq!(meta.creation_time_millis(), meta.access_time_millis());
        assert_eq!(meta.creation_time_millis(), meta.modified_time_millis());
    }

    #[test]
    fn test_updates_move_only_their_own_stamp() {
        let meta = FileMetadata::new();
        let created = meta.creation_time_millis();
        meta.accessed_ms.store(0, Ordering::Release);
        meta.modified_ms.store(0, Ordering::Release);

        meta.update_access_time();
        assert!(meta.access_time_millis() >= created);
        assert_eq!(meta.modified_time_millis(), 0);

        meta.update_modified_time();
        assert!(meta.modified_time_millis() >= created);
        assert_eq!(meta.creation_time_millis(), created);
    }

    #[test]
    fn test_ownership_round_trip() {
        let meta = FileMetadata::new();
        meta.set_uid(1000);
        meta.set_gid(100);
        meta.set_mode(0o600);
        assert_eq!(meta.uid(), 1000);
        assert_eq!(meta.gid(), 100);
        assert_eq!(meta.mode(), 0o600);
    }
}

//! A regular file: one byte store bound to metadata, a reader/writer lock
//! and the two counters that gate its lifetime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::debug;

use crate::file::meta::FileMetadata;
use crate::file::rwlock::{BlockingCtx, InterruptibleRwLock, RwReadGuard, RwWriteGuard, Unblocked};
use crate::store::{PagePool, PagedStore};

/// A regular file's identity. Directory entries (hard links) and open
/// channels both reference it; the content is freed only when the link count
/// and the open-handle count are both zero.
#[derive(Debug)]
pub struct RegularFile {
    store: InterruptibleRwLock<PagedStore>,
    /// Size mirror readable without the lock; republished whenever a write
    /// guard is released.
    size: AtomicU64,
    meta: FileMetadata,
    links: AtomicU32,
    open_handles: AtomicU32,
}

impl RegularFile {
    /// Create an empty file drawing content pages from `pool`. Link count
    /// starts at zero: the directory layer links it in.
    pub fn new(pool: Arc<PagePool>) -> Self {
        Self::from_store(PagedStore::new(pool))
    }

    fn from_store(store: PagedStore) -> Self {
        let size = store.size();
        Self {
            store: InterruptibleRwLock::new(store),
            size: AtomicU64::new(size),
            meta: FileMetadata::new(),
            links: AtomicU32::new(0),
            open_handles: AtomicU32::new(0),
        }
    }

    /// Current size without acquiring the lock.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.meta
    }

    pub fn update_access_time(&self) {
        self.meta.update_access_time();
    }

    pub fn update_modified_time(&self) {
        self.meta.update_modified_time();
    }

    pub fn link_count(&self) -> u32 {
        self.links.load(Ordering::Acquire)
    }

    /// Called by the directory layer when a new hard link names this file.
    pub fn increment_link_count(&self) {
        self.links.fetch_add(1, Ordering::AcqRel);
    }

    /// Called by the directory layer on unlink. May free the content if no
    /// channel still holds the file open.
    pub fn decrement_link_count(&self) {
        self.links.fetch_sub(1, Ordering::AcqRel);
        self.maybe_free();
    }

    /// Called when a channel opens on this file.
    pub(crate) fn opened(&self) {
        self.open_handles.fetch_add(1, Ordering::AcqRel);
    }

    /// Called when a channel releases this file. Frees the content once both
    /// the link count and the open-handle count are zero (deferred deletion:
    /// an unlinked file stays readable through its open channels).
    pub(crate) fn closed(&self) {
        self.open_handles.fetch_sub(1, Ordering::AcqRel);
        self.maybe_free();
    }

    /// New file with a deep copy of this file's content and fresh metadata.
    pub fn copy_content(&self) -> RegularFile {
        let guard = self.store.read();
        Self::from_store(guard.duplicate())
    }

    /// Shared content access for channel reads; abandoned when the calling
    /// thread is interrupted or `ctx.open` flips.
    pub(crate) fn lock_read(
        &self,
        ctx: &BlockingCtx<'_>,
    ) -> Result<RwReadGuard<'_, PagedStore>, Unblocked> {
        self.store.read_interruptibly(ctx)
    }

    /// Exclusive content access for channel writes. The returned guard
    /// republishes the size mirror when it is released.
    pub(crate) fn lock_write(&self, ctx: &BlockingCtx<'_>) -> Result<StoreWriteGuard<'_>, Unblocked> {
        let guard = self.store.write_interruptibly(ctx)?;
        Ok(StoreWriteGuard {
            guard,
            size: &self.size,
        })
    }

    /// Uninterruptible shared access, for embedders and maintenance.
    pub fn read_locked(&self) -> RwReadGuard<'_, PagedStore> {
        self.store.read()
    }

    /// Uninterruptible exclusive access, for embedders and maintenance.
    pub fn write_locked(&self) -> StoreWriteGuard<'_> {
        StoreWriteGuard {
            guard: self.store.write(),
            size: &self.size,
        }
    }

    fn maybe_free(&self) {
        if self.links.load(Ordering::Acquire) == 0 && self.open_handles.load(Ordering::Acquire) == 0
        {
            let mut store = self.store.write();
            store.free();
            self.size.store(0, Ordering::Release);
            debug!("file content freed (no links, no open handles)");
        }
    }
}

/// Write access to a file's store. Dereferences to [`PagedStore`]; on drop,
/// publishes the store's size to the lock-free mirror before the lock is
/// released.
pub struct StoreWriteGuard<'a> {
    guard: RwWriteGuard<'a, PagedStore>,
    size: &'a AtomicU64,
}

impl std::ops::Deref for StoreWriteGuard<'_> {
    type Target = PagedStore;

    fn deref(&self) -> &PagedStore {
        &self.guard
    }
}

impl std::ops::DerefMut for StoreWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut PagedStore {
        &mut self.guard
    }
}

impl Drop for StoreWriteGuard<'_> {
    fn drop(&mut self) {
        self.size.store(self.guard.size(), Ordering::Release);
    }
}

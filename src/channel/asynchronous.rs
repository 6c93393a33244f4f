//! Asynchronous facade over the synchronous channel.
//!
//! Each potentially blocking operation is handed to the runtime's blocking
//! pool and awaited. All correctness comes from the synchronous core;
//! dropping a returned future does not interrupt the operation already
//! running on the pool.

use std::sync::Arc;

use tokio::task;

use crate::channel::advisory::AdvisoryLock;
use crate::channel::file_channel::FileChannel;
use crate::error::Result;

/// A positional, asynchronous view of a [`FileChannel`].
#[derive(Clone)]
pub struct AsyncFileChannel {
    inner: Arc<FileChannel>,
}

impl AsyncFileChannel {
    pub fn new(channel: Arc<FileChannel>) -> Self {
        Self { inner: channel }
    }

    /// The synchronous channel this facade dispatches to.
    pub fn channel(&self) -> &Arc<FileChannel> {
        &self.inner
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Read up to `len` bytes at `position`. `None` at end of file.
    pub async fn read_at(&self, position: u64, len: usize) -> Result<Option<Vec<u8>>> {
        let channel = Arc::clone(&self.inner);
        task::spawn_blocking(move || {
            let mut buf = vec![0u8; len];
            match channel.read_at(&mut buf, position)? {
                Some(n) => {
                    buf.truncate(n);
                    Ok(Some(buf))
                }
                None => Ok(None),
            }
        })
        .await
        .expect("blocking I/O task panicked")
    }

    /// Write `data` at `position` (at the file's size in append mode).
    pub async fn write_at(&self, data: Vec<u8>, position: u64) -> Result<usize> {
        let channel = Arc::clone(&self.inner);
        task::spawn_blocking(move || channel.write_at(&data, position))
            .await
            .expect("blocking I/O task panicked")
    }

    /// Acquire an advisory lock; grants immediately, but runs on the blocking
    /// pool for symmetry with the other operations.
    pub async fn lock(&self, position: u64, size: u64, shared: bool) -> Result<Arc<AdvisoryLock>> {
        let channel = Arc::clone(&self.inner);
        task::spawn_blocking(move || channel.lock(position, size, shared))
            .await
            .expect("blocking I/O task panicked")
    }

    pub fn try_lock(&self, position: u64, size: u64, shared: bool) -> Result<Arc<AdvisoryLock>> {
        self.inner.try_lock(position, size, shared)
    }

    pub fn size(&self) -> Result<u64> {
        self.inner.size()
    }

    pub fn truncate(&self, size: u64) -> Result<()> {
        self.inner.truncate(size)
    }

    pub fn force(&self, metadata: bool) -> Result<()> {
        self.inner.force(metadata)
    }

    pub fn close(&self) {
        self.inner.close();
    }
}

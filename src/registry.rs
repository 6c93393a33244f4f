//! Filesystem-wide bookkeeping of open channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::debug;

use crate::channel::FileChannel;

/// The open-handle registry of one filesystem instance. Channels register at
/// construction and unregister at close; [`close_all`] shuts down whatever is
/// still open when the filesystem itself closes.
///
/// [`close_all`]: FilesystemState::close_all
#[derive(Debug)]
pub struct FilesystemState {
    channels: Mutex<HashMap<u64, Weak<FileChannel>>>,
    next_id: AtomicU64,
}

impl FilesystemState {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register(&self, id: u64, channel: &Arc<FileChannel>) {
        self.channels
            .lock()
            .unwrap()
            .insert(id, Arc::downgrade(channel));
    }

    pub(crate) fn unregister(&self, id: u64) {
        self.channels.lock().unwrap().remove(&id);
    }

    /// Number of currently open registered channels.
    pub fn open_channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Close every registered channel. Blocked operations on those channels
    /// unwind with an asynchronous-close error.
    pub fn close_all(&self) {
        let open: Vec<Arc<FileChannel>> = {
            let channels = self.channels.lock().unwrap();
            channels.values().filter_map(Weak::upgrade).collect()
        };
        debug!("closing {} registered channels", open.len());
        for channel in open {
            channel.close();
        }
    }
}

impl Default for FilesystemState {
    fn default() -> Self {
        Self::new()
    }
}

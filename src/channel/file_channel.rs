//! The seekable channel: an open handle on one regular file.
//!
//! A channel layers three disciplines over the file it is bound to:
//!
//! - **Mode gating**: reads require the read flag, writes the write flag,
//!   before any state is touched.
//! - **Self-serialization**: read/write/transfer/truncate and position
//!   changes on one channel are mutually exclusive; a second thread calling
//!   into the same channel waits for the first.
//! - **Interruptible blocking**: before acquiring the file's lock, an
//!   operation records the calling thread's interrupt status in the blocking
//!   slot. Closing the channel from another thread wakes that thread, whose
//!   operation unwinds with an asynchronous-close error; interrupting it
//!   closes the channel and unwinds with a closed-by-interrupt error.
//!   Position and timestamps are only touched on the success path.

use std::io::{self, IoSlice, IoSliceMut, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use bitflags::bitflags;
use log::debug;

use crate::channel::advisory::AdvisoryLock;
use crate::error::{FsError, Result};
use crate::file::{BlockingCtx, RegularFile, Unblocked};
use crate::interrupt::{self, InterruptStatus};
use crate::registry::FilesystemState;
use crate::store::PagedStore;

bitflags! {
    /// How a channel is opened. With neither `READ` nor `WRITE` given, `READ`
    /// is assumed; `APPEND` implies `WRITE` and cannot be combined with
    /// `READ`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u32 {
        const READ = 1;
        const WRITE = 2;
        const APPEND = 4;
    }
}

#[derive(Debug)]
struct ChannelState {
    position: u64,
}

/// An open, seekable handle bound to exactly one [`RegularFile`].
#[derive(Debug)]
pub struct FileChannel {
    file: Arc<RegularFile>,
    state: Arc<FilesystemState>,
    id: u64,
    read: bool,
    write: bool,
    append: bool,
    open: AtomicBool,
    /// Position plus the per-channel operation mutex: holding this lock is
    /// what serializes operations on the channel.
    chan: Mutex<ChannelState>,
    /// Interrupt status of the thread currently inside a blocking operation,
    /// if any. Since that thread holds the channel mutex, there is at most
    /// one. `close` wakes it from here.
    blocking: Mutex<Option<Arc<InterruptStatus>>>,
    /// Advisory locks issued by this channel, invalidated on close.
    locks: Mutex<Vec<Weak<AdvisoryLock>>>,
}

impl FileChannel {
    /// Open a channel on `file` and register it with the filesystem's
    /// open-handle registry.
    pub fn open(
        file: Arc<RegularFile>,
        mode: OpenMode,
        state: Arc<FilesystemState>,
    ) -> Result<Arc<FileChannel>> {
        let mut mode = mode;
        if !mode.intersects(OpenMode::READ | OpenMode::WRITE | OpenMode::APPEND) {
            mode |= OpenMode::READ;
        }
        if mode.contains(OpenMode::APPEND) {
            if mode.contains(OpenMode::READ) {
                return Err(FsError::InvalidArgument(
                    "READ and APPEND cannot be combined",
                ));
            }
            mode |= OpenMode::WRITE;
        }

        let id = state.allocate_id();
        file.opened();
        let channel = Arc::new(FileChannel {
            file,
            state: Arc::clone(&state),
            id,
            read: mode.contains(OpenMode::READ),
            write: mode.contains(OpenMode::WRITE),
            append: mode.contains(OpenMode::APPEND),
            open: AtomicBool::new(true),
            chan: Mutex::new(ChannelState { position: 0 }),
            blocking: Mutex::new(None),
            locks: Mutex::new(Vec::new()),
        });
        state.register(id, &channel);
        Ok(channel)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn file(&self) -> &Arc<RegularFile> {
        &self.file
    }

    /// Read at the channel position, advancing it by the bytes read. `None`
    /// at end of file leaves the position unchanged.
    pub fn read(&self, dst: &mut [u8]) -> Result<Option<usize>> {
        self.check_open()?;
        self.check_readable()?;
        let mut chan = self.chan.lock().unwrap();
        let pos = chan.position;
        let n = self.run_read_locked(|store| Ok(store.read(pos, dst)))?;
        if let Some(n) = n {
            chan.position = pos + n as u64;
        }
        Ok(n)
    }

    /// Scatter read at the channel position.
    pub fn read_vectored(&self, dsts: &mut [IoSliceMut<'_>]) -> Result<Option<u64>> {
        let len = dsts.len();
        self.read_vectored_range(dsts, 0, len)
    }

    /// Scatter read into `dsts[offset..offset + len]`. Out-of-range indices
    /// fail before any lock is touched.
    pub fn read_vectored_range(
        &self,
        dsts: &mut [IoSliceMut<'_>],
        offset: usize,
        len: usize,
    ) -> Result<Option<u64>> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= dsts.len())
            .ok_or(FsError::InvalidArgument("scatter range out of bounds"))?;
        self.check_open()?;
        self.check_readable()?;
        let dsts = &mut dsts[offset..end];
        let mut chan = self.chan.lock().unwrap();
        let pos = chan.position;
        let n = self.run_read_locked(|store| Ok(store.read_vectored(pos, dsts)))?;
        if let Some(n) = n {
            chan.position = pos + n;
        }
        Ok(n)
    }

    /// Positional read. Updates the access time but never the channel
    /// position.
    pub fn read_at(&self, dst: &mut [u8], position: u64) -> Result<Option<usize>> {
        self.check_open()?;
        self.check_readable()?;
        let _chan = self.chan.lock().unwrap();
        self.run_read_locked(|store| Ok(store.read(position, dst)))
    }

    /// Write at the channel position (or at the file's size in append mode),
    /// advancing the position past the written bytes.
    pub fn write(&self, src: &[u8]) -> Result<usize> {
        self.check_open()?;
        self.check_writable()?;
        let mut chan = self.chan.lock().unwrap();
        let append = self.append;
        let mut effective = chan.position;
        let n = self.run_write_locked(|store| {
            if append {
                effective = store.size();
            }
            Ok(store.write(effective, src))
        })?;
        chan.position = effective + n as u64;
        Ok(n)
    }

    /// Gather write at the channel position.
    pub fn write_vectored(&self, srcs: &[IoSlice<'_>]) -> Result<u64> {
        self.write_vectored_range(srcs, 0, srcs.len())
    }

    /// Gather write from `srcs[offset..offset + len]`. Out-of-range indices
    /// fail before any lock is touched.
    pub fn write_vectored_range(
        &self,
        srcs: &[IoSlice<'_>],
        offset: usize,
        len: usize,
    ) -> Result<u64> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= srcs.len())
            .ok_or(FsError::InvalidArgument("gather range out of bounds"))?;
        self.check_open()?;
        self.check_writable()?;
        let srcs = &srcs[offset..end];
        let mut chan = self.chan.lock().unwrap();
        let append = self.append;
        let mut effective = chan.position;
        let n = self.run_write_locked(|store| {
            if append {
                effective = store.size();
            }
            Ok(store.write_vectored(effective, srcs))
        })?;
        chan.position = effective + n;
        Ok(n)
    }

    /// Positional write. In append mode the caller's position is overridden
    /// by the file size (resolved under the write lock) and the channel
    /// position moves past the written bytes; otherwise the channel position
    /// is untouched.
    pub fn write_at(&self, src: &[u8], position: u64) -> Result<usize> {
        self.check_open()?;
        self.check_writable()?;
        let mut chan = self.chan.lock().unwrap();
        let append = self.append;
        let mut effective = position;
        let n = self.run_write_locked(|store| {
            if append {
                effective = store.size();
            }
            Ok(store.write(effective, src))
        })?;
        if append {
            chan.position = effective + n as u64;
        }
        Ok(n)
    }

    /// Copy up to `count` bytes from `position` into `sink`. The channel
    /// position is untouched.
    pub fn transfer_to<W: Write + ?Sized>(
        &self,
        position: u64,
        count: u64,
        sink: &mut W,
    ) -> Result<u64> {
        self.check_open()?;
        self.check_readable()?;
        let _chan = self.chan.lock().unwrap();
        self.run_read_locked(|store| store.transfer_to(position, count, sink))
    }

    /// Copy up to `count` bytes from `source` to `position` (the file size in
    /// append mode). The channel position moves only in append mode.
    pub fn transfer_from<R: Read + ?Sized>(
        &self,
        source: &mut R,
        position: u64,
        count: u64,
    ) -> Result<u64> {
        self.check_open()?;
        self.check_writable()?;
        let mut chan = self.chan.lock().unwrap();
        let append = self.append;
        let mut effective = position;
        let transferred = self.run_write_locked(|store| {
            if append {
                effective = store.size();
            }
            store.transfer_from(source, effective, count)
        })?;
        if append {
            chan.position = effective + transferred;
        }
        Ok(transferred)
    }

    pub fn position(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.chan.lock().unwrap().position)
    }

    pub fn set_position(&self, position: u64) -> Result<()> {
        self.check_open()?;
        self.chan.lock().unwrap().position = position;
        Ok(())
    }

    pub fn size(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.file.size())
    }

    /// Shrink the file to `size`; the position is clamped to the new size.
    pub fn truncate(&self, size: u64) -> Result<()> {
        self.check_open()?;
        self.check_writable()?;
        let mut chan = self.chan.lock().unwrap();
        self.run_write_locked(|store| {
            store.truncate(size);
            Ok(())
        })?;
        if chan.position > size {
            chan.position = size;
        }
        Ok(())
    }

    /// No-op: every write is immediately visible in memory.
    pub fn force(&self, _metadata: bool) -> Result<()> {
        self.check_open()?;
        Ok(())
    }

    /// Memory mapping has no in-memory representation here.
    pub fn map(&self, _position: u64, _size: u64) -> Result<()> {
        Err(FsError::Unsupported("memory mapping"))
    }

    /// Acquire an advisory lock on `[position, position + size)`. Grants
    /// immediately: the filesystem is in-process and advisory locks are not
    /// enforced.
    pub fn lock(&self, position: u64, size: u64, shared: bool) -> Result<Arc<AdvisoryLock>> {
        self.check_open()?;
        if shared {
            self.check_readable()?;
        } else {
            self.check_writable()?;
        }
        let lock = Arc::new(AdvisoryLock::new(position, size, shared));
        let mut locks = self.locks.lock().unwrap();
        locks.retain(|weak| weak.strong_count() > 0);
        locks.push(Arc::downgrade(&lock));
        Ok(lock)
    }

    /// Identical to [`lock`]: acquisition never waits.
    ///
    /// [`lock`]: Self::lock
    pub fn try_lock(&self, position: u64, size: u64, shared: bool) -> Result<Arc<AdvisoryLock>> {
        self.lock(position, size, shared)
    }

    /// Close the channel. Idempotent. A thread blocked in an operation on
    /// this channel is woken and unwinds with an asynchronous-close error;
    /// outstanding advisory locks are invalidated; the channel is removed
    /// from the registry and the file releases one open handle.
    pub fn close(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(status) = self.blocking.lock().unwrap().clone() {
            status.wake();
        }
        for lock in self.locks.lock().unwrap().drain(..) {
            if let Some(lock) = lock.upgrade() {
                lock.invalidate();
            }
        }
        self.state.unregister(self.id);
        self.file.closed();
        debug!("channel {} closed", self.id);
    }

    fn check_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(FsError::ClosedChannel)
        }
    }

    fn check_readable(&self) -> Result<()> {
        if self.read {
            Ok(())
        } else {
            Err(FsError::NonReadable)
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.write {
            Ok(())
        } else {
            Err(FsError::NonWritable)
        }
    }

    fn begin_blocking(&self) -> Arc<InterruptStatus> {
        let status = interrupt::current();
        *self.blocking.lock().unwrap() = Some(Arc::clone(&status));
        status
    }

    /// The interruptible-blocking template for read-class operations: record
    /// the blocking thread, re-check `open`, take the file's read lock
    /// interruptibly, run `op`, update the access time on success, and
    /// convert abandoned acquisitions in the epilogue.
    fn run_read_locked<T>(&self, op: impl FnOnce(&PagedStore) -> io::Result<T>) -> Result<T> {
        let status = self.begin_blocking();
        let mut outcome = None;
        let mut interrupted = false;
        if self.is_open() {
            let ctx = BlockingCtx {
                status: &status,
                open: &self.open,
            };
            match self.file.lock_read(&ctx) {
                Ok(guard) => {
                    let result = op(&guard);
                    if result.is_ok() {
                        self.file.update_access_time();
                    }
                    outcome = Some(result);
                }
                Err(Unblocked::Interrupted) => {
                    status.set();
                    interrupted = true;
                }
                Err(Unblocked::ChannelClosed) => {}
            }
        }
        self.end_blocking(outcome, interrupted)
    }

    /// Write-side counterpart of [`run_read_locked`]: exclusive lock,
    /// modified time on success.
    ///
    /// [`run_read_locked`]: Self::run_read_locked
    fn run_write_locked<T>(&self, op: impl FnOnce(&mut PagedStore) -> io::Result<T>) -> Result<T> {
        let status = self.begin_blocking();
        let mut outcome = None;
        let mut interrupted = false;
        if self.is_open() {
            let ctx = BlockingCtx {
                status: &status,
                open: &self.open,
            };
            match self.file.lock_write(&ctx) {
                Ok(mut guard) => {
                    let result = op(&mut guard);
                    if result.is_ok() {
                        self.file.update_modified_time();
                    }
                    outcome = Some(result);
                }
                Err(Unblocked::Interrupted) => {
                    status.set();
                    interrupted = true;
                }
                Err(Unblocked::ChannelClosed) => {}
            }
        }
        self.end_blocking(outcome, interrupted)
    }

    /// Epilogue of a blocking operation. An interrupt observed while blocked
    /// closes the channel (the interrupt flag has already been re-asserted);
    /// an operation that never completed can only mean the channel was closed
    /// from another thread.
    fn end_blocking<T>(&self, outcome: Option<io::Result<T>>, interrupted: bool) -> Result<T> {
        *self.blocking.lock().unwrap() = None;
        if interrupted {
            self.close();
            return Err(FsError::ClosedByInterrupt);
        }
        match outcome {
            Some(result) => result.map_err(FsError::from),
            None => Err(FsError::AsynchronousClose),
        }
    }

    #[cfg(test)]
    fn is_blocking(&self) -> bool {
        self.blocking.lock().unwrap().is_some()
    }
}

impl Drop for FileChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PageLayout, PagePool};
    use std::sync::Barrier;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn setup() -> (Arc<RegularFile>, Arc<FilesystemState>) {
        let file = Arc::new(RegularFile::new(PagePool::new(PageLayout::new(64))));
        // A directory entry normally holds this link.
        file.increment_link_count();
        (file, Arc::new(FilesystemState::new()))
    }

    fn open(file: &Arc<RegularFile>, state: &Arc<FilesystemState>, mode: OpenMode) -> Arc<FileChannel> {
        FileChannel::open(Arc::clone(file), mode, Arc::clone(state)).unwrap()
    }

    #[test]
    fn test_open_defaults_to_read() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::empty());
        assert!(ch.read);
        assert!(!ch.write);
    }

    #[test]
    fn test_append_implies_write_and_rejects_read() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::APPEND);
        assert!(ch.write);
        assert!(ch.append);

        let err = FileChannel::open(
            Arc::clone(&file),
            OpenMode::READ | OpenMode::APPEND,
            Arc::clone(&state),
        )
        .unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));
    }

    #[test]
    fn test_write_read_round_trip_with_position() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);

        assert_eq!(ch.write(&[0x41, 0x42, 0x43]).unwrap(), 3);
        assert_eq!(ch.position().unwrap(), 3);
        assert_eq!(ch.size().unwrap(), 3);

        ch.set_position(0).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(ch.read(&mut buf).unwrap(), Some(3));
        assert_eq!(buf, [0x41, 0x42, 0x43]);
        assert_eq!(ch.position().unwrap(), 3);

        // End of file: no bytes, position unchanged.
        assert_eq!(ch.read(&mut buf).unwrap(), None);
        assert_eq!(ch.position().unwrap(), 3);
    }

    #[test]
    fn test_sparse_write() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);
        ch.write_at(&[0xFF], 5).unwrap();
        assert_eq!(ch.size().unwrap(), 6);

        let mut buf = [9u8; 6];
        assert_eq!(ch.read(&mut buf).unwrap(), Some(6));
        assert_eq!(buf, [0, 0, 0, 0, 0, 0xFF]);
    }

    #[test]
    fn test_truncate_below_position() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);
        ch.write(&[1u8; 10]).unwrap();
        assert_eq!(ch.position().unwrap(), 10);

        ch.truncate(4).unwrap();
        assert_eq!(ch.size().unwrap(), 4);
        assert_eq!(ch.position().unwrap(), 4);

        let mut buf = [0u8; 4];
        assert_eq!(ch.read(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_mode_gating_fails_without_touching_the_file_lock() {
        let (file, state) = setup();
        let writer = open(&file, &state, OpenMode::WRITE);
        let reader = open(&file, &state, OpenMode::READ);

        // Hold the file's write lock: gating must still fail immediately.
        let guard = file.write_locked();
        let mut buf = [0u8; 4];
        assert!(matches!(writer.read(&mut buf), Err(FsError::NonReadable)));
        assert!(matches!(reader.write(&buf), Err(FsError::NonWritable)));
        assert!(matches!(reader.truncate(0), Err(FsError::NonWritable)));
        drop(guard);
    }

    #[test]
    fn test_gather_write_bad_indices_fail_before_locking() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::WRITE);

        let guard = file.write_locked();
        let a = [1u8; 4];
        let b = [2u8; 4];
        let srcs = [IoSlice::new(&a), IoSlice::new(&b)];
        let err = ch.write_vectored_range(&srcs, 5, 2).unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));
        let err = ch.write_vectored_range(&srcs, usize::MAX, 2).unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));
        drop(guard);
    }

    #[test]
    fn test_scatter_gather_round_trip() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);

        let a = [1u8; 40];
        let b = [2u8; 40];
        let written = ch
            .write_vectored(&[IoSlice::new(&a), IoSlice::new(&b)])
            .unwrap();
        assert_eq!(written, 80);
        assert_eq!(ch.position().unwrap(), 80);

        ch.set_position(0).unwrap();
        let mut x = [0u8; 40];
        let mut y = [0u8; 40];
        let read = ch
            .read_vectored(&mut [IoSliceMut::new(&mut x), IoSliceMut::new(&mut y)])
            .unwrap();
        assert_eq!(read, Some(80));
        assert_eq!(x, a);
        assert_eq!(y, b);
        assert_eq!(ch.position().unwrap(), 80);
    }

    #[test]
    fn test_positional_read_does_not_move_position() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);
        ch.write(b"positional").unwrap();
        ch.set_position(2).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(ch.read_at(&mut buf, 0).unwrap(), Some(4));
        assert_eq!(&buf, b"posi");
        assert_eq!(ch.position().unwrap(), 2);
    }

    #[test]
    fn test_explicit_position_write_without_append_keeps_position() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);
        ch.write(b"0123456789").unwrap();
        ch.set_position(3).unwrap();

        assert_eq!(ch.write_at(b"xy", 7).unwrap(), 2);
        assert_eq!(ch.position().unwrap(), 3);
        assert_eq!(ch.size().unwrap(), 10);
    }

    #[test]
    fn test_explicit_position_write_with_append_goes_to_end() {
        let (file, state) = setup();
        let writer = open(&file, &state, OpenMode::APPEND);
        writer.write(b"base").unwrap();

        // Append overrides the requested position entirely.
        assert_eq!(writer.write_at(b"!!", 0).unwrap(), 2);
        assert_eq!(writer.position().unwrap(), 6);
        assert_eq!(writer.size().unwrap(), 6);

        let reader = open(&file, &state, OpenMode::READ);
        let mut buf = [0u8; 6];
        reader.read(&mut buf).unwrap();
        assert_eq!(&buf, b"base!!");
    }

    #[test]
    fn test_append_two_concurrent_writes() {
        let (file, state) = setup();
        let barrier = Arc::new(Barrier::new(2));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let ch = open(&file, &state, OpenMode::APPEND);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                ch.write(&[0x01, 0x02]).unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }

        let reader = open(&file, &state, OpenMode::READ);
        assert_eq!(reader.size().unwrap(), 4);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), Some(4));
        // Each write lands contiguously; only the order is unspecified.
        assert_eq!(buf, [0x01, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn test_close_unblocks_blocked_reader_with_asynchronous_close() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ);

        // Another party holds the file's write lock, so the read blocks.
        let guard = file.write_locked();

        let ch2 = Arc::clone(&ch);
        let blocked = thread::spawn(move || {
            let mut buf = [0u8; 4];
            ch2.read(&mut buf)
        });

        while !ch.is_blocking() {
            thread::sleep(Duration::from_millis(1));
        }
        ch.close();

        let result = blocked.join().unwrap();
        assert!(matches!(result, Err(FsError::AsynchronousClose)));
        assert!(!ch.is_open());
        assert!(matches!(ch.position(), Err(FsError::ClosedChannel)));
        drop(guard);
    }

    #[test]
    fn test_interrupt_of_blocked_reader_closes_channel() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ);

        let guard = file.write_locked();

        let ch2 = Arc::clone(&ch);
        let (tx, rx) = mpsc::channel();
        let blocked = thread::spawn(move || {
            tx.send(interrupt::current()).unwrap();
            let mut buf = [0u8; 4];
            let result = ch2.read(&mut buf);
            // The interrupt is re-asserted on the thread before the error
            // surfaces.
            let still_interrupted = interrupt::current().clear();
            (result, still_interrupted)
        });

        let status = rx.recv().unwrap();
        while !ch.is_blocking() {
            thread::sleep(Duration::from_millis(1));
        }
        status.interrupt();

        let (result, still_interrupted) = blocked.join().unwrap();
        assert!(matches!(result, Err(FsError::ClosedByInterrupt)));
        assert!(still_interrupted);
        assert!(!ch.is_open());
        drop(guard);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);
        assert_eq!(state.open_channel_count(), 1);
        ch.close();
        ch.close();
        assert!(!ch.is_open());
        assert_eq!(state.open_channel_count(), 0);
    }

    #[test]
    fn test_operations_on_closed_channel_fail() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);
        ch.close();

        let mut buf = [0u8; 1];
        assert!(matches!(ch.read(&mut buf), Err(FsError::ClosedChannel)));
        assert!(matches!(ch.write(&buf), Err(FsError::ClosedChannel)));
        assert!(matches!(ch.position(), Err(FsError::ClosedChannel)));
        assert!(matches!(ch.set_position(0), Err(FsError::ClosedChannel)));
        assert!(matches!(ch.size(), Err(FsError::ClosedChannel)));
        assert!(matches!(ch.truncate(0), Err(FsError::ClosedChannel)));
        assert!(matches!(ch.force(true), Err(FsError::ClosedChannel)));
        assert!(matches!(ch.lock(0, 1, true), Err(FsError::ClosedChannel)));
    }

    #[test]
    fn test_advisory_locks_mode_gating_and_close_invalidation() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);

        let shared = ch.lock(0, 10, true).unwrap();
        let exclusive = ch.try_lock(10, 10, false).unwrap();
        assert!(shared.is_valid());
        assert!(exclusive.is_valid());

        shared.release();
        assert!(!shared.is_valid());

        ch.close();
        assert!(!exclusive.is_valid());

        let reader = open(&file, &state, OpenMode::READ);
        assert!(matches!(reader.lock(0, 1, false), Err(FsError::NonWritable)));
        let writer = open(&file, &state, OpenMode::WRITE);
        assert!(matches!(writer.lock(0, 1, true), Err(FsError::NonReadable)));
    }

    #[test]
    fn test_transfer_to_and_from() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);
        ch.write(&[7u8; 100]).unwrap();

        let mut sink = Vec::new();
        assert_eq!(ch.transfer_to(20, 30, &mut sink).unwrap(), 30);
        assert_eq!(sink, vec![7u8; 30]);
        // The position is a positional operation's business, not ours.
        assert_eq!(ch.position().unwrap(), 100);

        let mut source = io::Cursor::new(vec![8u8; 10]);
        assert_eq!(ch.transfer_from(&mut source, 100, 100).unwrap(), 10);
        assert_eq!(ch.size().unwrap(), 110);
        assert_eq!(ch.position().unwrap(), 100);
    }

    #[test]
    fn test_transfer_from_append_moves_position() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::APPEND);
        ch.write(b"head").unwrap();

        let mut source = io::Cursor::new(vec![1u8; 6]);
        // The requested position is ignored in append mode.
        assert_eq!(ch.transfer_from(&mut source, 0, 6).unwrap(), 6);
        assert_eq!(ch.size().unwrap(), 10);
        assert_eq!(ch.position().unwrap(), 10);
    }

    #[test]
    fn test_map_is_unsupported() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::READ | OpenMode::WRITE);
        assert!(matches!(ch.map(0, 10), Err(FsError::Unsupported(_))));
    }

    #[test]
    fn test_force_is_a_no_op() {
        let (file, state) = setup();
        let ch = open(&file, &state, OpenMode::WRITE);
        ch.write(b"data").unwrap();
        ch.force(true).unwrap();
        ch.force(false).unwrap();
        assert_eq!(ch.size().unwrap(), 4);
    }

    #[test]
    fn test_close_all_closes_registered_channels() {
        let (file, state) = setup();
        let a = open(&file, &state, OpenMode::READ);
        let b = open(&file, &state, OpenMode::WRITE);
        assert_eq!(state.open_channel_count(), 2);

        state.close_all();
        assert!(!a.is_open());
        assert!(!b.is_open());
        assert_eq!(state.open_channel_count(), 0);
    }

    #[test]
    fn test_visibility_across_channels() {
        let (file, state) = setup();
        let writer = open(&file, &state, OpenMode::WRITE);
        let reader = open(&file, &state, OpenMode::READ);

        writer.write(b"visible").unwrap();
        let mut buf = [0u8; 7];
        assert_eq!(reader.read(&mut buf).unwrap(), Some(7));
        assert_eq!(&buf, b"visible");
    }
}

//! The paged byte store backing one regular file.
//!
//! A growable sequence of fixed-size pages plus a logical size. Bytes in
//! `[0, size)` are defined; anything that becomes observable past the old end
//! (sparse writes, regrowth after truncate) reads as zero. The store performs
//! no locking: the owning file serializes access through its reader/writer
//! lock.

use std::io::{self, ErrorKind, IoSlice, IoSliceMut, Read, Write};
use std::sync::Arc;

use super::layout::PageLayout;
use super::pool::PagePool;

#[derive(Debug)]
pub struct PagedStore {
    layout: PageLayout,
    pool: Arc<PagePool>,
    pages: Vec<Box<[u8]>>,
    size: u64,
}

impl PagedStore {
    /// Create an empty store drawing pages from `pool`.
    pub fn new(pool: Arc<PagePool>) -> Self {
        Self {
            layout: pool.layout(),
            pool,
            pages: Vec::new(),
            size: 0,
        }
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    /// Current logical length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read into `dst` starting at `position`. Returns `None` when
    /// `position >= size` (end of file); otherwise the number of bytes read,
    /// never reading past `size`.
    pub fn read(&self, position: u64, dst: &mut [u8]) -> Option<usize> {
        if position >= self.size {
            return None;
        }
        let n = (self.size - position).min(dst.len() as u64) as usize;
        let mut copied = 0;
        for span in self.layout.page_spans(position, n as u64) {
            let page = &self.pages[span.page_index];
            dst[copied..copied + span.len_in_page]
                .copy_from_slice(&page[span.offset_in_page..span.offset_in_page + span.len_in_page]);
            copied += span.len_in_page;
        }
        Some(n)
    }

    /// Scatter read: fill each buffer in order, stopping at `size`. Returns
    /// `None` when `position >= size` at entry.
    pub fn read_vectored(&self, position: u64, dsts: &mut [IoSliceMut<'_>]) -> Option<u64> {
        if position >= self.size {
            return None;
        }
        let mut at = position;
        let mut total = 0u64;
        for dst in dsts.iter_mut() {
            let buf: &mut [u8] = &mut dst[..];
            match self.read(at, buf) {
                Some(n) => {
                    total += n as u64;
                    at += n as u64;
                    if n < buf.len() {
                        break;
                    }
                }
                None => break,
            }
        }
        Some(total)
    }

    /// Write `src` at `position`, zero-filling `[size, position)` when writing
    /// past the end. Afterwards `size = max(old_size, position + written)`.
    /// Returns the number of bytes written (always `src.len()`).
    pub fn write(&mut self, position: u64, src: &[u8]) -> usize {
        self.prepare_for_write(position, src.len() as u64);
        self.copy_in(position, src);
        let end = position + src.len() as u64;
        if end > self.size {
            self.size = end;
        }
        src.len()
    }

    /// Gather write: consume each buffer in order starting at `position`.
    pub fn write_vectored(&mut self, position: u64, srcs: &[IoSlice<'_>]) -> u64 {
        let total: u64 = srcs.iter().map(|s| s.len() as u64).sum();
        self.prepare_for_write(position, total);
        let mut at = position;
        for src in srcs {
            self.copy_in(at, src);
            at += src.len() as u64;
        }
        if at > self.size {
            self.size = at;
        }
        total
    }

    /// Copy up to `count` bytes from `position` into `sink`. Returns `0` when
    /// `position >= size`. A sink that accepts fewer bytes than offered ends
    /// the transfer short; sink errors propagate.
    pub fn transfer_to<W: Write + ?Sized>(
        &self,
        position: u64,
        count: u64,
        sink: &mut W,
    ) -> io::Result<u64> {
        if position >= self.size {
            return Ok(0);
        }
        let n = (self.size - position).min(count);
        let mut done = 0u64;
        for span in self.layout.page_spans(position, n) {
            let page = &self.pages[span.page_index];
            let chunk = &page[span.offset_in_page..span.offset_in_page + span.len_in_page];
            let written = loop {
                match sink.write(chunk) {
                    Ok(w) => break w,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };
            done += written as u64;
            if written < chunk.len() {
                return Ok(done);
            }
        }
        Ok(done)
    }

    /// Copy up to `count` bytes from `source` to `position`, growing the
    /// store as needed. Stops early at source end-of-stream; a source that is
    /// already exhausted leaves the store untouched.
    pub fn transfer_from<R: Read + ?Sized>(
        &mut self,
        source: &mut R,
        position: u64,
        count: u64,
    ) -> io::Result<u64> {
        let mut buf = vec![0u8; self.layout.page_size as usize];
        let mut done = 0u64;
        while done < count {
            let want = (count - done).min(buf.len() as u64) as usize;
            let n = match source.read(&mut buf[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                break;
            }
            self.write(position + done, &buf[..n]);
            done += n as u64;
        }
        Ok(done)
    }

    /// Shrink to `new_size`, releasing pages no longer covered. Truncate
    /// never grows.
    pub fn truncate(&mut self, new_size: u64) {
        if new_size >= self.size {
            return;
        }
        self.size = new_size;
        let keep = self.layout.pages_for(new_size);
        let released: Vec<_> = self.pages.drain(keep..).collect();
        self.pool.release(released);
    }

    /// Independent deep copy with the same bytes, drawing fresh pages from
    /// the same pool.
    pub fn duplicate(&self) -> PagedStore {
        let mut pages = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let mut copy = self.pool.acquire();
            copy.copy_from_slice(page);
            pages.push(copy);
        }
        PagedStore {
            layout: self.layout,
            pool: Arc::clone(&self.pool),
            pages,
            size: self.size,
        }
    }

    /// Release every page back to the pool. Called when the last referent of
    /// the owning file is gone.
    pub(crate) fn free(&mut self) {
        self.size = 0;
        let pages = std::mem::take(&mut self.pages);
        self.pool.release(pages);
    }

    #[cfg(test)]
    pub(crate) fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Allocate pages to cover `[0, position + len)` and zero the gap
    /// `[size, position)` so stale bytes left by an earlier truncate never
    /// become observable.
    fn prepare_for_write(&mut self, position: u64, len: u64) {
        let end = position + len;
        let needed = self.layout.pages_for(end);
        while self.pages.len() < needed {
            self.pages.push(self.pool.acquire());
        }
        if position > self.size {
            let gap = position - self.size;
            for span in self.layout.page_spans(self.size, gap) {
                let page = &mut self.pages[span.page_index];
                page[span.offset_in_page..span.offset_in_page + span.len_in_page].fill(0);
            }
        }
    }

    fn copy_in(&mut self, position: u64, src: &[u8]) {
        let mut copied = 0;
        for span in self.layout.page_spans(position, src.len() as u64) {
            let page = &mut self.pages[span.page_index];
            page[span.offset_in_page..span.offset_in_page + span.len_in_page]
                .copy_from_slice(&src[copied..copied + span.len_in_page]);
            copied += span.len_in_page;
        }
    }
}

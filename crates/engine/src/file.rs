//! File & map management: initialization of a new file, growth, and the
//! read-only memory mapping.
//!
//! ```text
//! mmap size for a target of N bytes
//!
//!   N <= 32 KiB ............ 32 KiB
//!   N <= 1 GiB ............. next power of two
//!   N <= 256 TiB ........... next 1 GiB multiple, rounded up to a page
//!   otherwise .............. MapTooLarge
//! ```
//!
//! File growth is separate from the mapping: the file is extended with
//! `set_len` and the mapping is sized from the file through [`mmap_size`].

use std::sync::atomic::Ordering;

use config::{ALLOC_PAGES, MAX_MAP_SIZE, MAX_MMAP_STEP, MIN_MMAP_SIZE};
use memmap2::Mmap;
use page::{FormatError, HeadPage, Page, PageFlags, MIN_PAGE_COUNT};
use tracing::{debug, trace, warn};

use crate::{sys, Db, Error, Result};

/// Current mapping. `mmap` is `None` before the first map and after
/// [`Db::munmap`].
#[derive(Debug, Default)]
pub(crate) struct MapState {
    pub(crate) mmap: Option<Mmap>,
}

impl MapState {
    pub(crate) fn size(&self) -> u64 {
        self.mmap.as_ref().map_or(0, |m| m.len() as u64)
    }
}

/// Mapping size for a file of `size` bytes.
///
/// # Errors
///
/// [`Error::MapTooLarge`] above 256 TiB.
pub fn mmap_size(size: u64, page_size: usize) -> Result<u64> {
    let mut step = MIN_MMAP_SIZE;
    while step <= MAX_MMAP_STEP {
        if size <= step {
            return Ok(step);
        }
        step <<= 1;
    }

    if size > MAX_MAP_SIZE {
        return Err(Error::MapTooLarge { size });
    }

    let mut sz = size;
    let rem = sz % MAX_MMAP_STEP;
    if rem > 0 {
        sz += MAX_MMAP_STEP - rem;
    }
    let ps = page_size as u64;
    if sz % ps != 0 {
        sz = (sz / ps + 1) * ps;
    }
    Ok(sz.min(MAX_MAP_SIZE))
}

impl Db {
    /// Writes the head page and an empty data page into an empty file.
    pub(crate) fn init(&self) -> Result<()> {
        let ps = self.page_size;
        let mut buf = vec![0u8; ps * MIN_PAGE_COUNT as usize];
        let (page0, page1) = buf.split_at_mut(ps);

        let mut head = HeadPage::new(ps, self.compression);
        head.seal(page0)?;
        Page::new(PageFlags::DATA | PageFlags::FULL).encode_into(page1)?;

        sys::write_at(&self.file, &buf, 0).map_err(Error::io("pwrite"))?;
        self.file.sync_all().map_err(Error::io("fsync"))?;
        self.file_size.store(buf.len() as u64, Ordering::Release);

        debug!(
            path = %self.path.display(),
            page_size = ps,
            compression = %self.compression,
            "initialized database file"
        );
        Ok(())
    }

    /// Extends the file to at least `target` bytes. Caller holds the write
    /// lock.
    ///
    /// While the file is smaller than `ALLOC_PAGES` pages it grows to exactly
    /// `target`; after that it grows to `target` plus `ALLOC_PAGES` pages.
    ///
    /// With `no_grow_sync` the file is neither extended nor synced and the
    /// tracked size stays at the real file length; page writes past the end
    /// extend the file themselves (see `note_written`).
    pub(crate) fn grow_locked(&self, target: u64) -> Result<()> {
        let file_size = self.file_size();
        if target <= file_size {
            return Ok(());
        }
        if target > MAX_MAP_SIZE {
            return Err(Error::MapTooLarge { size: target });
        }

        let alloc_size = (ALLOC_PAGES * self.page_size) as u64;
        let new_size = if file_size < alloc_size {
            target
        } else {
            target
                .checked_add(alloc_size)
                .ok_or(Error::MapTooLarge { size: target })?
        };

        if self.opts.no_grow_sync {
            trace!(from = file_size, to = new_size, "skipped file growth");
            return Ok(());
        }

        self.file.set_len(new_size).map_err(Error::io("truncate"))?;
        self.file.sync_data().map_err(Error::io("fdatasync"))?;
        self.file_size.store(new_size, Ordering::Release);

        debug!(from = file_size, to = new_size, "grew database file");
        Ok(())
    }

    /// Raises the tracked file size after a positioned write ending at
    /// `end`, which extends the file if it was shorter.
    pub(crate) fn note_written(&self, end: u64) {
        self.file_size.fetch_max(end, Ordering::AcqRel);
    }

    /// Replaces the mapping with one covering `max(file_size, min_size)`,
    /// then reloads and validates the head page from it.
    pub(crate) fn mmap(&self, min_size: u64) -> Result<()> {
        let file_size = self.file_size();
        let min_file = self.page_size as u64 * u64::from(MIN_PAGE_COUNT);
        if file_size < min_file {
            return Err(FormatError::FileTooSmall {
                size: file_size,
                min: min_file,
            }
            .into());
        }

        let size = mmap_size(file_size.max(min_size), self.page_size)?;

        let head = {
            let mut map = self.map.write();
            if let Some(old) = map.mmap.take() {
                sys::unmap_file(old);
            }

            let mmap = sys::map_file(&self.file, size, self.opts.mmap_populate)
                .map_err(Error::io("mmap"))?;
            if let Err(e) = sys::advise(&mmap, self.opts.mmap_advice) {
                warn!(error = %e, "madvise failed");
            }

            let page0 = mmap
                .get(..self.page_size)
                .ok_or(FormatError::ShortBuffer {
                    needed: self.page_size,
                    got: mmap.len(),
                })?;
            let head = HeadPage::decode(page0)?;
            head.validate(page0)?;

            map.mmap = Some(mmap);
            head
        };
        *self.head.lock() = head;

        debug!(map_size = size, file_size, "mapped database file");
        Ok(())
    }

    /// Releases the mapping. Page reads fail with [`Error::Closed`] until the
    /// next [`remap`](Db::remap). Idempotent.
    pub fn munmap(&self) {
        let mut map = self.map.write();
        if let Some(mmap) = map.mmap.take() {
            sys::unmap_file(mmap);
        }
    }

    /// Extends the file so it holds at least `size` bytes.
    ///
    /// # Errors
    ///
    /// [`Error::ReadOnly`] on read-only handles; [`Error::Io`] if the file
    /// cannot be extended or synced.
    pub fn grow(&self, size: u64) -> Result<()> {
        self.ensure_writable()?;
        let _w = self.write_lock.lock();
        self.grow_locked(size)
    }

    /// Re-maps the file with a mapping of at least `min_size` bytes. The file
    /// size is re-read first, so readers can pick up growth by the writer.
    pub fn remap(&self, min_size: u64) -> Result<()> {
        let _w = self.write_lock.lock();
        let len = self.file.metadata().map_err(Error::io("stat"))?.len();
        self.file_size.store(len, Ordering::Release);
        self.mmap(min_size)
    }
}

//! Write path: `write_page()`, the typed data/index page writers, and head
//! page updates.
//!
//! The mapping is read-only, so every write goes through a positioned write
//! on the file. Writes past the end of the file grow it first; writes past
//! the end of the mapping remap afterwards. All writers serialize on
//! `write_lock`.

use page::{
    check_index_order, encode_index_entries, page_offset, FormatError, HeadPage, Index, Page,
    PageFlags, PageId, RecordPtr, HEAD_PAGE_SIZE, INDEX_SIZE, MIN_PAGE_COUNT, PAGE_HEADER_SIZE,
};
use record::{KvPair, RecordBuilder, RecordError, MIN_RECORD_SIZE};
use tracing::trace;

use crate::{sys, Db, Error, Result};

impl Db {
    /// Writes `page` followed by `payload` to page `id`.
    ///
    /// `ptr`, `len` and `checksum` are filled in from `payload`; the rest of
    /// the header is taken from `page`. The page count in the head page is
    /// raised to cover `id`.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`] on read-only handles.
    /// - [`Error::PageOutOfRange`] for page 0.
    /// - [`Error::PayloadTooLarge`] if `payload` does not fit after the header.
    /// - [`Error::Format`] for invalid flags.
    pub fn write_page(&self, id: PageId, page: &Page, payload: &[u8]) -> Result<()> {
        self.write_page_with(id, page, payload, |_| {})
    }

    /// Encodes `pairs` as one prefix-compressed run into DATA page `id` and
    /// points the head page's `kv_ptr` at the last record.
    ///
    /// `pairs` must be in ascending key order.
    pub fn write_data_page(&self, id: PageId, next: PageId, pairs: &[KvPair]) -> Result<()> {
        let mut builder = RecordBuilder::new(self.compressor());
        for kv in pairs {
            builder.push(kv)?;
        }
        let last = builder.offsets().last().copied();
        let count = builder.count();
        let payload = builder.finish();

        let mut page = Page::new(PageFlags::DATA | PageFlags::FULL);
        page.next = next;
        page.count = self.entry_count(count, payload.len())?;

        self.write_page_with(id, &page, &payload, |head| {
            if let Some(offset) = last {
                head.kv_ptr = RecordPtr::new(id, (PAGE_HEADER_SIZE + offset) as u32);
            }
        })
    }

    /// Writes `entries` to INDEX page `id` and points the head page's
    /// `index_ptr` at the last entry.
    pub fn write_index_page(&self, id: PageId, next: PageId, entries: &[Index]) -> Result<()> {
        check_index_order(entries)?;
        let payload = encode_index_entries(entries);

        let mut page = Page::new(PageFlags::INDEX);
        page.next = next;
        page.count = self.entry_count(entries.len(), payload.len())?;

        self.write_page_with(id, &page, &payload, |head| {
            if let Some(last) = entries.len().checked_sub(1) {
                let offset = PAGE_HEADER_SIZE + last * INDEX_SIZE;
                head.index_ptr = RecordPtr::new(id, offset as u32);
            }
        })
    }

    /// Applies `f` to a copy of the head page, then seals and persists it.
    ///
    /// Identity fields (`magic`, `version`, `page_size`, `ptr`,
    /// `compression`) are restored after `f` runs. Returns the stored head.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] if `f` drops `page_count` below two; nothing is
    /// written in that case.
    pub fn update_head<F>(&self, f: F) -> Result<HeadPage>
    where
        F: FnOnce(&mut HeadPage),
    {
        self.ensure_writable()?;
        let _w = self.write_lock.lock();

        let current = self.head();
        let mut head = current;
        f(&mut head);
        head.magic = current.magic;
        head.version = current.version;
        head.page_size = current.page_size;
        head.ptr = current.ptr;
        head.compression = current.compression;
        if head.page_count < MIN_PAGE_COUNT {
            return Err(FormatError::PageCount {
                count: head.page_count,
            }
            .into());
        }

        self.commit_head(head)
    }

    /// Encodes `kv` against `prev_key` with this file's compression.
    ///
    /// # Errors
    ///
    /// [`RecordError::BelowMinimum`] if the encoding is shorter than
    /// [`MIN_RECORD_SIZE`] bytes (for example a one-byte key with an empty
    /// value), since [`decode_record`](Db::decode_record) would reject it.
    pub fn encode_record(&self, kv: &KvPair, prev_key: &[u8]) -> Result<Vec<u8>> {
        let bytes = kv.encode(prev_key, self.compressor());
        if bytes.len() < MIN_RECORD_SIZE {
            return Err(RecordError::BelowMinimum { len: bytes.len() }.into());
        }
        Ok(bytes)
    }

    fn entry_count(&self, count: usize, payload_len: usize) -> Result<u16> {
        u16::try_from(count).map_err(|_| Error::PayloadTooLarge {
            len: payload_len,
            capacity: Page::capacity(self.page_size),
        })
    }

    fn write_page_with<F>(&self, id: PageId, page: &Page, payload: &[u8], update: F) -> Result<()>
    where
        F: FnOnce(&mut HeadPage),
    {
        self.ensure_writable()?;
        if id == 0 {
            return Err(Error::PageOutOfRange {
                id,
                page_count: self.head().page_count,
            });
        }
        let capacity = Page::capacity(self.page_size);
        if payload.len() > capacity {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                capacity,
            });
        }
        page.validate()?;

        let mut header = *page;
        header.ptr = PAGE_HEADER_SIZE as u32;
        header.len = payload.len() as u32;
        header.checksum = Page::compute_checksum(payload);

        let mut buf = vec![0u8; self.page_size];
        header.encode_into(&mut buf)?;
        buf[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + payload.len()].copy_from_slice(payload);

        let _w = self.write_lock.lock();

        let offset = page_offset(id, self.page_size);
        let end = offset + self.page_size as u64;
        self.grow_locked(end)?;
        sys::write_at(&self.file, &buf, offset).map_err(Error::io("pwrite"))?;
        self.note_written(end);
        trace!(id, len = payload.len(), count = header.count, "wrote page");

        if end > self.map_size() {
            self.mmap(end)?;
        }

        let mut head = self.head();
        head.page_count = head.page_count.max(id + 1);
        update(&mut head);
        self.commit_head(head)?;
        Ok(())
    }

    /// Seals `head` against the current page 0 and writes it. Caller holds
    /// the write lock.
    fn commit_head(&self, mut head: HeadPage) -> Result<HeadPage> {
        let mut page0 = {
            let map = self.map.read();
            let mmap = map.mmap.as_ref().ok_or(Error::Closed)?;
            mmap.get(..self.page_size).ok_or(Error::Closed)?.to_vec()
        };
        head.seal(&mut page0)?;
        sys::write_at(&self.file, &page0[..HEAD_PAGE_SIZE], 0).map_err(Error::io("pwrite"))?;

        *self.head.lock() = head;
        Ok(head)
    }
}

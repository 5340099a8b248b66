//! Read path: page guards over the mapping and typed page decoding.
//!
//! Every read checks the page id against the cached head page and the
//! tracked file size before touching the mapping, so a mapping that is
//! larger than the file is never read past its end.

use page::{check_index_order, decode_index_entries, page_offset, Index, Page, PageId};
use parking_lot::RwLockReadGuard;
use record::{KvPair, RecordIter};

use crate::{Db, Error, PageRef, Result};

impl Db {
    /// Borrows page `id` (header and payload) from the mapping.
    ///
    /// The guard holds the map read lock; drop it before calling
    /// [`remap`](Db::remap) from the same thread. Further reads may be
    /// taken while it is held, even with a remap waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::PageOutOfRange`] for page 0 or ids at or past the page count.
    /// - [`Error::Closed`] if the file is not mapped.
    pub fn read_page(&self, id: PageId) -> Result<PageRef<'_>> {
        let page_count = self.head.lock().page_count;
        let out_of_range = Error::PageOutOfRange { id, page_count };
        if id == 0 || id >= page_count {
            return Err(out_of_range);
        }

        let start = page_offset(id, self.page_size);
        let end = start + self.page_size as u64;
        if end > self.file_size() {
            return Err(out_of_range);
        }
        let (start, end) = (start as usize, end as usize);

        RwLockReadGuard::try_map(self.map.read_recursive(), |m| {
            m.mmap.as_ref().and_then(|mmap| mmap.get(start..end))
        })
        .map_err(|m| {
            if m.mmap.is_none() {
                Error::Closed
            } else {
                out_of_range
            }
        })
    }

    /// Decodes the header of page `id`.
    pub fn page_header(&self, id: PageId) -> Result<Page> {
        let page = self.read_page(id)?;
        Ok(Page::decode(&page)?)
    }

    /// Decodes every record stored in data page `id`, in order.
    ///
    /// # Errors
    ///
    /// - [`Error::Format`] if the page is not a data page, the payload lies
    ///   outside the page, or the payload checksum does not match.
    /// - [`Error::Record`] if a record fails to decode.
    pub fn read_records(&self, id: PageId) -> Result<Vec<KvPair>> {
        let page = self.read_page(id)?;
        let header = Page::decode(&page)?;
        header.expect_data()?;
        let payload = header.payload(&page)?;
        header.verify_payload(payload)?;

        let records = RecordIter::new(payload, header.count as usize, self.decompressor())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Decodes the entries of index page `id` and checks their order.
    pub fn read_index_page(&self, id: PageId) -> Result<Vec<Index>> {
        let page = self.read_page(id)?;
        let header = Page::decode(&page)?;
        header.expect_index()?;
        let payload = header.payload(&page)?;
        header.verify_payload(payload)?;

        let entries = decode_index_entries(payload, header.count as usize)?;
        check_index_order(&entries)?;
        Ok(entries)
    }

    /// Decodes one record encoded against `prev_key` with this file's
    /// compression.
    pub fn decode_record(&self, data: &[u8], prev_key: &[u8]) -> Result<KvPair> {
        Ok(KvPair::decode(data, prev_key, self.decompressor())?)
    }
}

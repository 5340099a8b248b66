//! Sparse index entries and record pointers.
//!
//! ```text
//! Index (16 bytes)              RecordPtr (8 bytes)
//! ------------------            -------------------
//!  0  6  start key prefix        0  4  page_num
//!  6  6  end key prefix          4  4  offset
//! 12  4  page_num
//! ```
//!
//! Key prefixes are truncated to [`INDEX_KEY_LEN`] bytes and zero padded,
//! so an entry only bounds its page's key range approximately.

use byteorder::{ByteOrder, LittleEndian};

use crate::{ensure_len, FormatError, PageId};

/// Bytes of key kept in an index bound.
pub const INDEX_KEY_LEN: usize = 6;

/// Serialized size of [`Index`].
pub const INDEX_SIZE: usize = 16;

/// Serialized size of [`RecordPtr`].
pub const RECORD_PTR_SIZE: usize = 8;

/// Exact `(page, byte offset)` locator within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct RecordPtr {
    pub page_num: PageId,
    pub offset: u32,
}

impl RecordPtr {
    #[must_use]
    pub const fn new(page_num: PageId, offset: u32) -> Self {
        Self { page_num, offset }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        ensure_len(buf, RECORD_PTR_SIZE)?;
        Ok(Self {
            page_num: LittleEndian::read_u32(&buf[0..]),
            offset: LittleEndian::read_u32(&buf[4..]),
        })
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<(), FormatError> {
        ensure_len(buf, RECORD_PTR_SIZE)?;
        LittleEndian::write_u32(&mut buf[0..], self.page_num);
        LittleEndian::write_u32(&mut buf[4..], self.offset);
        Ok(())
    }

    /// Absolute byte position in the file.
    #[must_use]
    pub fn file_offset(&self, page_size: usize) -> u64 {
        u64::from(self.page_num) * page_size as u64 + u64::from(self.offset)
    }
}

/// Key-range → page entry of the sparse index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Index {
    pub start: [u8; INDEX_KEY_LEN],
    pub end: [u8; INDEX_KEY_LEN],
    pub page_num: PageId,
}

impl Index {
    /// Entry covering `first_key..=last_key` on `page_num`.
    #[must_use]
    pub fn new(first_key: &[u8], last_key: &[u8], page_num: PageId) -> Self {
        Self {
            start: truncate_key(first_key),
            end: truncate_key(last_key),
            page_num,
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        ensure_len(buf, INDEX_SIZE)?;
        let mut start = [0u8; INDEX_KEY_LEN];
        let mut end = [0u8; INDEX_KEY_LEN];
        start.copy_from_slice(&buf[0..INDEX_KEY_LEN]);
        end.copy_from_slice(&buf[INDEX_KEY_LEN..2 * INDEX_KEY_LEN]);
        Ok(Self {
            start,
            end,
            page_num: LittleEndian::read_u32(&buf[2 * INDEX_KEY_LEN..]),
        })
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<(), FormatError> {
        ensure_len(buf, INDEX_SIZE)?;
        buf[0..INDEX_KEY_LEN].copy_from_slice(&self.start);
        buf[INDEX_KEY_LEN..2 * INDEX_KEY_LEN].copy_from_slice(&self.end);
        LittleEndian::write_u32(&mut buf[2 * INDEX_KEY_LEN..], self.page_num);
        Ok(())
    }

    /// `true` if `key`'s truncated prefix lies within `[start, end]`. False
    /// positives are possible, false negatives are not.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let k = truncate_key(key);
        self.start <= k && k <= self.end
    }
}

fn truncate_key(key: &[u8]) -> [u8; INDEX_KEY_LEN] {
    let mut out = [0u8; INDEX_KEY_LEN];
    let n = key.len().min(INDEX_KEY_LEN);
    out[..n].copy_from_slice(&key[..n]);
    out
}

/// Entries must be non-decreasing and must not overlap their predecessor.
/// Adjacent entries may share a boundary prefix.
pub fn check_index_order(entries: &[Index]) -> Result<(), FormatError> {
    for (i, e) in entries.iter().enumerate() {
        if e.start > e.end {
            return Err(FormatError::IndexOrder { position: i });
        }
        if i > 0 && e.start < entries[i - 1].end {
            return Err(FormatError::IndexOrder { position: i });
        }
    }
    Ok(())
}

/// Serializes entries back to back.
#[must_use]
pub fn encode_index_entries(entries: &[Index]) -> Vec<u8> {
    let mut buf = vec![0u8; entries.len() * INDEX_SIZE];
    for (chunk, e) in buf.chunks_exact_mut(INDEX_SIZE).zip(entries) {
        // chunk is exactly INDEX_SIZE bytes
        let _ = e.encode_into(chunk);
    }
    buf
}

/// Reads `count` entries from the front of `payload`.
pub fn decode_index_entries(payload: &[u8], count: usize) -> Result<Vec<Index>, FormatError> {
    ensure_len(payload, count * INDEX_SIZE)?;
    payload
        .chunks_exact(INDEX_SIZE)
        .take(count)
        .map(Index::decode)
        .collect()
}

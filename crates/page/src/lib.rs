//! # Page - On-Disk Page Layout
//!
//! Fixed binary layouts for a SiDB database file. The file is a sequence of
//! equally sized pages; page 0 holds the [`HeadPage`], every other page
//! starts with a [`Page`] header followed by its payload.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ PAGE 0 (offset 0)                                             │
//! │   HeadPage (48 bytes) | head-local data ... up to page_size    │
//! │   checksum covers bytes [ptr, page_size) of this page         │
//! ├───────────────────────────────────────────────────────────────┤
//! │ PAGE i (offset i * page_size, i >= 1)                          │
//! │   Page header (20 bytes) | payload (len bytes) | free ...     │
//! │   payload is a record run (DATA) or index entries (INDEX)     │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Every structure is (de)serialized through
//! explicit field offsets; nothing depends on in-memory struct layout.
//!
//! | Structure   | Size | Module     |
//! |-------------|------|------------|
//! | `HeadPage`  | 48 B | [`head`]   |
//! | `Page`      | 20 B | [`header`] |
//! | `Index`     | 16 B | [`index`]  |
//! | `RecordPtr` | 8 B  | [`index`]  |

mod checksum;
pub mod head;
pub mod header;
pub mod index;

use thiserror::Error;

pub use checksum::crc32;
pub use head::{HeadPage, HEAD_PAGE_SIZE, MAGIC, VERSION};
pub use header::{Page, PageFlags, PAGE_HEADER_SIZE};
pub use index::{
    check_index_order, decode_index_entries, encode_index_entries, Index, RecordPtr,
    INDEX_KEY_LEN, INDEX_SIZE, RECORD_PTR_SIZE,
};

/// Page number within the file. Page 0 is the head page.
pub type PageId = u32;

/// Page size used when the host granularity cannot be determined.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Largest page size the 16-bit page offsets can address.
pub const MAX_PAGE_SIZE: usize = 0xFFFF;

/// A database always holds the head page plus at least one page.
pub const MIN_PAGE_COUNT: u32 = 2;

/// Byte offset of page `id`.
///
/// # Panics
///
/// Panics if `id == 0`: page 0 is reserved for the [`HeadPage`] and is
/// never addressed as a generic page.
#[must_use]
pub fn page_offset(id: PageId, page_size: usize) -> u64 {
    assert!(id != 0, "page 0 is the head page and cannot be addressed as a Page");
    u64::from(id) * page_size as u64
}

/// Clamps a host page size into the supported range.
#[must_use]
pub fn clamp_page_size(host: Option<usize>) -> usize {
    match host {
        Some(sz) if sz >= HEAD_PAGE_SIZE => sz.min(MAX_PAGE_SIZE),
        _ => DEFAULT_PAGE_SIZE,
    }
}

/// Layout and integrity errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("wrong magic: {found:#010x}")]
    BadMagic { found: u32 },

    #[error("version mismatch: file has {found}, expected {VERSION}")]
    VersionMismatch { found: u16 },

    #[error("head checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("file size {size} is smaller than two pages ({min} bytes)")]
    FileTooSmall { size: u64, min: u64 },

    #[error("invalid page size {page_size} (data offset {ptr})")]
    BadPageSize { page_size: u32, ptr: u32 },

    #[error("page count {count} is below the minimum {MIN_PAGE_COUNT}")]
    PageCount { count: u32 },

    #[error("unknown compression algorithm id {0}")]
    UnknownCompression(u16),

    #[error("buffer too small: need {needed} bytes, got {got}")]
    ShortBuffer { needed: usize, got: usize },

    #[error("invalid page flags {0:#04x}")]
    BadPageFlags(u8),

    #[error("payload [{ptr}, {ptr}+{len}) exceeds page size {page_size}")]
    PayloadBounds { ptr: u32, len: u32, page_size: usize },

    #[error("page checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    PageChecksumMismatch { stored: u32, computed: u32 },

    #[error("index entry {position} is out of order or overlaps its predecessor")]
    IndexOrder { position: usize },

    #[error("expected a {expected} page, found flags {flags:?}")]
    UnexpectedPageKind {
        expected: &'static str,
        flags: PageFlags,
    },
}

/// Returns `ShortBuffer` unless `buf` holds at least `needed` bytes.
pub(crate) fn ensure_len(buf: &[u8], needed: usize) -> Result<(), FormatError> {
    if buf.len() < needed {
        return Err(FormatError::ShortBuffer {
            needed,
            got: buf.len(),
        });
    }
    Ok(())
}

//! Head page (page 0) layout.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       4   magic ("SIDB" on disk, 0x4244_4953 as u32 LE)
//!   4       4   checksum (CRC-32 of page 0 bytes [ptr, page_size), 0 = disabled)
//!   8       2   version
//!  10       2   compression algorithm id
//!  12       4   page_size
//!  16       4   page_count (including the head page)
//!  20       4   index_page_count
//!  24       8   index_ptr (RecordPtr)
//!  32       8   kv_ptr (RecordPtr)
//!  40       4   next_index_page
//!  44       4   ptr (start of head-local data = 48)
//! ```

use byteorder::{ByteOrder, LittleEndian};
use compress::Compression;

use crate::checksum::crc32;
use crate::header::PAGE_HEADER_SIZE;
use crate::index::RecordPtr;
use crate::{ensure_len, FormatError, PageId, MIN_PAGE_COUNT};

/// Magic number: the bytes `S I D B` read as a little-endian `u32`.
pub const MAGIC: u32 = 0x4244_4953;

/// Current file format version.
pub const VERSION: u16 = 1;

/// Serialized size of [`HeadPage`].
pub const HEAD_PAGE_SIZE: usize = 48;

const OFF_MAGIC: usize = 0;
const OFF_CHECKSUM: usize = 4;
const OFF_VERSION: usize = 8;
const OFF_COMPRESSION: usize = 10;
const OFF_PAGE_SIZE: usize = 12;
const OFF_PAGE_COUNT: usize = 16;
const OFF_INDEX_PAGE_COUNT: usize = 20;
const OFF_INDEX_PTR: usize = 24;
const OFF_KV_PTR: usize = 32;
const OFF_NEXT_INDEX_PAGE: usize = 40;
const OFF_PTR: usize = 44;

/// Global file metadata stored at the start of page 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadPage {
    pub magic: u32,
    pub checksum: u32,
    pub version: u16,
    /// Raw algorithm id; see [`HeadPage::compression`].
    pub compression: u16,
    pub page_size: u32,
    pub page_count: u32,
    pub index_page_count: u32,
    /// Most recent index entry written.
    pub index_ptr: RecordPtr,
    /// Most recent record written.
    pub kv_ptr: RecordPtr,
    /// Continuation of the index page chain (0 = none).
    pub next_index_page: PageId,
    /// Offset where head-local data begins.
    pub ptr: u32,
}

impl HeadPage {
    /// Head page of a freshly initialized two-page file: index pointer at
    /// the head-local data, record pointer at the payload of page 1.
    #[must_use]
    pub fn new(page_size: usize, compression: Compression) -> Self {
        let ptr = HEAD_PAGE_SIZE as u32;
        Self {
            magic: MAGIC,
            checksum: 0,
            version: VERSION,
            compression: compression.id(),
            page_size: page_size as u32,
            page_count: MIN_PAGE_COUNT,
            index_page_count: 0,
            index_ptr: RecordPtr::new(0, ptr),
            kv_ptr: RecordPtr::new(1, PAGE_HEADER_SIZE as u32),
            next_index_page: 0,
            ptr,
        }
    }

    /// Reads the head fields from the front of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        ensure_len(buf, HEAD_PAGE_SIZE)?;
        Ok(Self {
            magic: LittleEndian::read_u32(&buf[OFF_MAGIC..]),
            checksum: LittleEndian::read_u32(&buf[OFF_CHECKSUM..]),
            version: LittleEndian::read_u16(&buf[OFF_VERSION..]),
            compression: LittleEndian::read_u16(&buf[OFF_COMPRESSION..]),
            page_size: LittleEndian::read_u32(&buf[OFF_PAGE_SIZE..]),
            page_count: LittleEndian::read_u32(&buf[OFF_PAGE_COUNT..]),
            index_page_count: LittleEndian::read_u32(&buf[OFF_INDEX_PAGE_COUNT..]),
            index_ptr: RecordPtr::decode(&buf[OFF_INDEX_PTR..])?,
            kv_ptr: RecordPtr::decode(&buf[OFF_KV_PTR..])?,
            next_index_page: LittleEndian::read_u32(&buf[OFF_NEXT_INDEX_PAGE..]),
            ptr: LittleEndian::read_u32(&buf[OFF_PTR..]),
        })
    }

    /// Writes the head fields into the front of `buf`.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<(), FormatError> {
        ensure_len(buf, HEAD_PAGE_SIZE)?;
        LittleEndian::write_u32(&mut buf[OFF_MAGIC..], self.magic);
        LittleEndian::write_u32(&mut buf[OFF_CHECKSUM..], self.checksum);
        LittleEndian::write_u16(&mut buf[OFF_VERSION..], self.version);
        LittleEndian::write_u16(&mut buf[OFF_COMPRESSION..], self.compression);
        LittleEndian::write_u32(&mut buf[OFF_PAGE_SIZE..], self.page_size);
        LittleEndian::write_u32(&mut buf[OFF_PAGE_COUNT..], self.page_count);
        LittleEndian::write_u32(&mut buf[OFF_INDEX_PAGE_COUNT..], self.index_page_count);
        self.index_ptr.encode_into(&mut buf[OFF_INDEX_PTR..])?;
        self.kv_ptr.encode_into(&mut buf[OFF_KV_PTR..])?;
        LittleEndian::write_u32(&mut buf[OFF_NEXT_INDEX_PAGE..], self.next_index_page);
        LittleEndian::write_u32(&mut buf[OFF_PTR..], self.ptr);
        Ok(())
    }

    /// CRC-32 over `page0[ptr..page_size]`.
    pub fn compute_checksum(&self, page0: &[u8]) -> Result<u32, FormatError> {
        let (start, end) = self.data_range()?;
        ensure_len(page0, end)?;
        Ok(crc32(&page0[start..end]))
    }

    /// Stores the checksum of `page0`'s data region in `self` and writes the
    /// head fields into `page0`.
    pub fn seal(&mut self, page0: &mut [u8]) -> Result<(), FormatError> {
        self.checksum = self.compute_checksum(page0)?;
        self.encode_into(page0)
    }

    /// Checks identity, geometry and integrity of page 0. Read-only.
    ///
    /// # Errors
    ///
    /// - [`FormatError::BadMagic`] / [`FormatError::VersionMismatch`] if the
    ///   file is not a SiDB file of this version.
    /// - [`FormatError::BadPageSize`] if `ptr`/`page_size` are inconsistent.
    /// - [`FormatError::ChecksumMismatch`] if a non-zero stored checksum
    ///   differs from the recomputed one.
    /// - [`FormatError::PageCount`] / [`FormatError::UnknownCompression`].
    pub fn validate(&self, page0: &[u8]) -> Result<(), FormatError> {
        self.check_identity()?;
        if self.checksum != 0 {
            let computed = self.compute_checksum(page0)?;
            if computed != self.checksum {
                return Err(FormatError::ChecksumMismatch {
                    stored: self.checksum,
                    computed,
                });
            }
        }
        if self.page_count < MIN_PAGE_COUNT {
            return Err(FormatError::PageCount {
                count: self.page_count,
            });
        }
        self.compression()?;
        Ok(())
    }

    /// Magic, version and page geometry only. Used before the page size
    /// stored in the file is trusted for mapping.
    pub fn check_identity(&self) -> Result<(), FormatError> {
        if self.magic != MAGIC {
            return Err(FormatError::BadMagic { found: self.magic });
        }
        if self.version != VERSION {
            return Err(FormatError::VersionMismatch {
                found: self.version,
            });
        }
        self.data_range().map(|_| ())
    }

    /// Resolves the persisted compression id.
    pub fn compression(&self) -> Result<Compression, FormatError> {
        Compression::from_id(self.compression)
            .ok_or(FormatError::UnknownCompression(self.compression))
    }

    /// Page size as `usize`.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size as usize
    }

    fn data_range(&self) -> Result<(usize, usize), FormatError> {
        let (ptr, page_size) = (self.ptr as usize, self.page_size as usize);
        if page_size < HEAD_PAGE_SIZE + PAGE_HEADER_SIZE || ptr < HEAD_PAGE_SIZE || ptr > page_size {
            return Err(FormatError::BadPageSize {
                page_size: self.page_size,
                ptr: self.ptr,
            });
        }
        Ok((ptr, page_size))
    }
}

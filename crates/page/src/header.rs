//! Generic page header, present at the start of every page except page 0.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       1   flag (PageFlags)
//!   1       1   reserved (0)
//!   2       2   count (records or index entries)
//!   4       4   len (payload bytes)
//!   8       4   next (same-typed page chain, 0 = none)
//!  12       4   ptr (payload start within the page)
//!  16       4   checksum (CRC-32 of the payload, 0 = disabled)
//! ```

use std::fmt;
use std::ops::BitOr;

use byteorder::{ByteOrder, LittleEndian};

use crate::checksum::crc32;
use crate::{ensure_len, FormatError, PageId};

/// Serialized size of [`Page`].
pub const PAGE_HEADER_SIZE: usize = 20;

const OFF_FLAG: usize = 0;
const OFF_RESERVED: usize = 1;
const OFF_COUNT: usize = 2;
const OFF_LEN: usize = 4;
const OFF_NEXT: usize = 8;
const OFF_PTR: usize = 12;
const OFF_CHECKSUM: usize = 16;

/// Page type and fragmentation bits.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PageFlags(u8);

impl PageFlags {
    /// Page holds index entries.
    pub const INDEX: PageFlags = PageFlags(1 << 0);
    /// Page holds key/value records.
    pub const DATA: PageFlags = PageFlags(1 << 1);
    /// Every record in the page is stored whole.
    pub const FULL: PageFlags = PageFlags(1 << 2);
    /// First page of a record spanning several pages.
    pub const FIRST: PageFlags = PageFlags(1 << 3);
    /// Interior page of a spanning record.
    pub const MIDDLE: PageFlags = PageFlags(1 << 4);
    /// Last page of a spanning record.
    pub const LAST: PageFlags = PageFlags(1 << 5);

    const KNOWN: u8 = 0b0011_1111;
    const KIND: u8 = Self::INDEX.0 | Self::DATA.0;
    const LAYOUT: u8 = Self::FULL.0 | Self::FIRST.0 | Self::MIDDLE.0 | Self::LAST.0;

    #[must_use]
    pub const fn empty() -> Self {
        PageFlags(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        PageFlags(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn has(self, flag: PageFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn set(&mut self, flag: PageFlags) {
        self.0 |= flag.0;
    }

    pub fn clear(&mut self, flag: PageFlags) {
        self.0 &= !flag.0;
    }

    pub fn toggle(&mut self, flag: PageFlags) {
        self.0 ^= flag.0;
    }

    #[must_use]
    pub fn is_index(self) -> bool {
        self.has(Self::INDEX)
    }

    #[must_use]
    pub fn is_data(self) -> bool {
        self.has(Self::DATA)
    }

    /// `true` if any of FIRST / MIDDLE / LAST is set.
    #[must_use]
    pub fn is_fragment(self) -> bool {
        self.has(Self::FIRST) || self.has(Self::MIDDLE) || self.has(Self::LAST)
    }

    /// Exactly one of INDEX/DATA; at most one of FULL/FIRST/MIDDLE/LAST; no
    /// unknown bits.
    pub fn validate(self) -> Result<(), FormatError> {
        let kind = self.0 & Self::KIND;
        let layout = self.0 & Self::LAYOUT;
        if self.0 & !Self::KNOWN != 0 || kind.count_ones() != 1 || layout.count_ones() > 1 {
            return Err(FormatError::BadPageFlags(self.0));
        }
        Ok(())
    }
}

impl BitOr for PageFlags {
    type Output = PageFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        PageFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for PageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::INDEX, "INDEX"),
            (Self::DATA, "DATA"),
            (Self::FULL, "FULL"),
            (Self::FIRST, "FIRST"),
            (Self::MIDDLE, "MIDDLE"),
            (Self::LAST, "LAST"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.has(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "PageFlags({:#04x})", self.0)
        } else {
            write!(f, "{}", set.join("|"))
        }
    }
}

/// Header of a data or index page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub flags: PageFlags,
    pub count: u16,
    pub len: u32,
    pub next: PageId,
    pub ptr: u32,
    pub checksum: u32,
}

impl Page {
    /// Empty page of the given kind with the payload starting right after
    /// the header.
    #[must_use]
    pub fn new(flags: PageFlags) -> Self {
        Self {
            flags,
            count: 0,
            len: 0,
            next: 0,
            ptr: PAGE_HEADER_SIZE as u32,
            checksum: 0,
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        ensure_len(buf, PAGE_HEADER_SIZE)?;
        Ok(Self {
            flags: PageFlags::from_bits(buf[OFF_FLAG]),
            count: LittleEndian::read_u16(&buf[OFF_COUNT..]),
            len: LittleEndian::read_u32(&buf[OFF_LEN..]),
            next: LittleEndian::read_u32(&buf[OFF_NEXT..]),
            ptr: LittleEndian::read_u32(&buf[OFF_PTR..]),
            checksum: LittleEndian::read_u32(&buf[OFF_CHECKSUM..]),
        })
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<(), FormatError> {
        ensure_len(buf, PAGE_HEADER_SIZE)?;
        buf[OFF_FLAG] = self.flags.bits();
        buf[OFF_RESERVED] = 0;
        LittleEndian::write_u16(&mut buf[OFF_COUNT..], self.count);
        LittleEndian::write_u32(&mut buf[OFF_LEN..], self.len);
        LittleEndian::write_u32(&mut buf[OFF_NEXT..], self.next);
        LittleEndian::write_u32(&mut buf[OFF_PTR..], self.ptr);
        LittleEndian::write_u32(&mut buf[OFF_CHECKSUM..], self.checksum);
        Ok(())
    }

    /// Flag invariants.
    pub fn validate(&self) -> Result<(), FormatError> {
        self.flags.validate()
    }

    /// Slice of `page` holding this page's payload.
    pub fn payload<'a>(&self, page: &'a [u8]) -> Result<&'a [u8], FormatError> {
        let start = self.ptr as usize;
        let end = start + self.len as usize;
        if start < PAGE_HEADER_SIZE || end > page.len() {
            return Err(FormatError::PayloadBounds {
                ptr: self.ptr,
                len: self.len,
                page_size: page.len(),
            });
        }
        Ok(&page[start..end])
    }

    /// CRC-32 of a payload.
    #[must_use]
    pub fn compute_checksum(payload: &[u8]) -> u32 {
        crc32(payload)
    }

    /// Verifies `payload` against the stored checksum (skipped when zero).
    pub fn verify_payload(&self, payload: &[u8]) -> Result<(), FormatError> {
        if self.checksum == 0 {
            return Ok(());
        }
        let computed = Self::compute_checksum(payload);
        if computed != self.checksum {
            return Err(FormatError::PageChecksumMismatch {
                stored: self.checksum,
                computed,
            });
        }
        Ok(())
    }

    /// Largest payload a page of `page_size` bytes can hold.
    #[must_use]
    pub fn capacity(page_size: usize) -> usize {
        page_size.saturating_sub(PAGE_HEADER_SIZE)
    }
}

impl Page {
    /// Fails unless the flags mark an INDEX page.
    pub fn expect_index(&self) -> Result<(), FormatError> {
        self.expect_kind(PageFlags::INDEX, "index")
    }

    /// Fails unless the flags mark a DATA page.
    pub fn expect_data(&self) -> Result<(), FormatError> {
        self.expect_kind(PageFlags::DATA, "data")
    }

    fn expect_kind(&self, kind: PageFlags, expected: &'static str) -> Result<(), FormatError> {
        self.validate()?;
        if !self.flags.has(kind) {
            return Err(FormatError::UnexpectedPageKind {
                expected,
                flags: self.flags,
            });
        }
        Ok(())
    }
}

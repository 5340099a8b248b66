//! # Compress - Pluggable Payload Compression
//!
//! Leaf crate of the SiDB workspace. Each [`Compression`] algorithm id maps
//! to a pair of plain functions:
//!
//! ```text
//! compress:   &[u8] -> Vec<u8>                       (deterministic, never fails)
//! decompress: &[u8] -> Result<Vec<u8>, CompressError>
//! ```
//!
//! The mapping is resolved at the point of use through
//! [`Compression::backend`]; there is no global registry to mutate. The
//! algorithm id is a `u16` persisted in the database head page, so a file
//! is always read back with the codec it was written with.
//!
//! | Id | Algorithm | Wire format                                   |
//! |----|-----------|-----------------------------------------------|
//! | 0  | `None`    | no backend                                    |
//! | 1  | `Snappy`  | raw Snappy block (no framing)                 |
//! | 2  | `Lz4`     | `uncompressed_len: u32 LE` + LZ4 block        |
//!
//! ## Example
//!
//! ```rust
//! use compress::Compression;
//!
//! let backend = Compression::Snappy.backend().unwrap();
//! let packed = (backend.compress)(b"aaaaaaaaaaaaaaaaaaaaaaaa");
//! assert_eq!((backend.decompress)(&packed).unwrap(), b"aaaaaaaaaaaaaaaaaaaaaaaa");
//! ```

use std::fmt;

use thiserror::Error;

/// Largest decompressed payload we will allocate for (64 MiB). Prevents OOM
/// when a corrupt length header claims a huge output.
pub const MAX_DECOMPRESSED_BYTES: usize = 64 * 1024 * 1024;

/// Compresses a byte slice. Must be deterministic; callers only adopt the
/// output when it is strictly smaller than the input.
pub type Compressor = fn(&[u8]) -> Vec<u8>;

/// Decompresses a byte slice produced by the matching [`Compressor`].
pub type Decompressor = fn(&[u8]) -> Result<Vec<u8>, CompressError>;

/// Errors returned by a [`Decompressor`].
#[derive(Debug, Error)]
pub enum CompressError {
    /// Malformed Snappy input.
    #[error("snappy decode error: {0}")]
    Snappy(#[from] snap::Error),

    /// Malformed LZ4 input.
    #[error("lz4 decode error: {0}")]
    Lz4(#[from] lz4_flex::block::DecompressError),

    /// Input too short to carry the LZ4 length header.
    #[error("lz4 input too short: {0} bytes")]
    Lz4Header(usize),

    /// The encoded length exceeds [`MAX_DECOMPRESSED_BYTES`].
    #[error("decompressed size {0} exceeds limit {MAX_DECOMPRESSED_BYTES}")]
    TooLarge(usize),
}

/// Compression algorithm id as stored in the head page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum Compression {
    /// Payloads are stored as-is.
    None = 0,
    /// General-purpose fast codec. Default for newly created files.
    #[default]
    Snappy = 1,
    /// LZ-family block codec.
    Lz4 = 2,
}

/// A resolved `(compress, decompress)` function pair.
#[derive(Clone, Copy)]
pub struct Backend {
    pub compress: Compressor,
    pub decompress: Decompressor,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

impl Compression {
    /// Every known algorithm, in id order.
    pub const ALL: [Compression; 3] = [Compression::None, Compression::Snappy, Compression::Lz4];

    /// Returns the on-disk id.
    #[must_use]
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Maps an on-disk id back to an algorithm. Returns `None` for unknown ids.
    #[must_use]
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(Compression::None),
            1 => Some(Compression::Snappy),
            2 => Some(Compression::Lz4),
            _ => None,
        }
    }

    /// Parses a case-insensitive algorithm name (`none`, `snappy`, `lz4`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Compression::None),
            "snappy" => Some(Compression::Snappy),
            "lz4" => Some(Compression::Lz4),
            _ => None,
        }
    }

    /// Lower-case algorithm name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
        }
    }

    /// Resolves the function pair for this algorithm. `None` has no backend.
    #[must_use]
    pub fn backend(self) -> Option<Backend> {
        match self {
            Compression::None => None,
            Compression::Snappy => Some(Backend {
                compress: snappy_compress,
                decompress: snappy_decompress,
            }),
            Compression::Lz4 => Some(Backend {
                compress: lz4_compress,
                decompress: lz4_decompress,
            }),
        }
    }

    /// Shorthand for the compressor half of [`backend`](Self::backend).
    #[must_use]
    pub fn compressor(self) -> Option<Compressor> {
        self.backend().map(|b| b.compress)
    }

    /// Shorthand for the decompressor half of [`backend`](Self::backend).
    #[must_use]
    pub fn decompressor(self) -> Option<Decompressor> {
        self.backend().map(|b| b.decompress)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snappy raw-block compression.
///
/// `snap` only fails for inputs larger than ~4 GiB; those are returned
/// unchanged so the caller keeps the uncompressed form.
pub fn snappy_compress(input: &[u8]) -> Vec<u8> {
    snap::raw::Encoder::new()
        .compress_vec(input)
        .unwrap_or_else(|_| input.to_vec())
}

/// Snappy raw-block decompression.
pub fn snappy_decompress(input: &[u8]) -> Result<Vec<u8>, CompressError> {
    let len = snap::raw::decompress_len(input)?;
    if len > MAX_DECOMPRESSED_BYTES {
        return Err(CompressError::TooLarge(len));
    }
    Ok(snap::raw::Decoder::new().decompress_vec(input)?)
}

/// LZ4 block compression with a 4-byte little-endian size prefix.
pub fn lz4_compress(input: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress_prepend_size(input)
}

/// LZ4 block decompression of a size-prefixed block.
pub fn lz4_decompress(input: &[u8]) -> Result<Vec<u8>, CompressError> {
    if input.len() < 4 {
        return Err(CompressError::Lz4Header(input.len()));
    }
    let len = u32::from_le_bytes([input[0], input[1], input[2], input[3]]) as usize;
    if len > MAX_DECOMPRESSED_BYTES {
        return Err(CompressError::TooLarge(len));
    }
    Ok(lz4_flex::block::decompress(&input[4..], len)?)
}

#[cfg(test)]
mod tests;

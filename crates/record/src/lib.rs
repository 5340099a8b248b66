//! # Record - Key/Value Record Codec
//!
//! Serializes a [`KvPair`] into a compact, self-describing byte sequence.
//! Successive keys in sort order share prefixes, so every record is encoded
//! relative to the key that precedes it and only the differing suffix is
//! stored. Key suffix and value may each be compressed through a
//! [`compress`] backend when that makes them strictly smaller.
//!
//! ## Binary Record Format
//!
//! ```text
//! [flags: u8][prefix_len: u8, only if KEY_PREFIXED]
//! [key_len: uvarint][key suffix ...]
//! [val_len: uvarint][value ...]
//! ```
//!
//! | Flag bit | Name               | Meaning                                  |
//! |----------|--------------------|------------------------------------------|
//! | `0x01`   | `KEY_PREFIXED`     | first `prefix_len` key bytes come from the previous key |
//! | `0x02`   | `KEY_COMPRESSED`   | key suffix bytes are compressed          |
//! | `0x04`   | `VALUE_COMPRESSED` | value bytes are compressed               |
//!
//! The prefix length is a single byte, so a shared prefix is capped at 255
//! bytes even when the real common prefix is longer.
//!
//! A decodable record is at least [`MIN_RECORD_SIZE`] bytes long. The
//! [`RecordBuilder`] refuses records below that size.
//!
//! ## Example
//!
//! ```rust
//! use compress::Compression;
//! use record::KvPair;
//!
//! let kv = KvPair::new(b"keykeykeykey".to_vec(), b"valuevaluevaluevaluevaluevalue".to_vec());
//! let bytes = kv.encode(b"key", Compression::Snappy.compressor());
//! let back = KvPair::decode(&bytes, b"key", Compression::Snappy.decompressor()).unwrap();
//! assert_eq!(back, kv);
//! ```

mod builder;
pub mod varint;

use std::borrow::Cow;
use std::cmp::Ordering;

use byteorder::{ReadBytesExt, WriteBytesExt};
use compress::{CompressError, Compressor, Decompressor};
use thiserror::Error;

pub use builder::{RecordBuilder, RecordIter};
use varint::{decode_uvarint, encode_uvarint, uvarint_len, VarintError};

/// Smallest decodable record: flag + 1-byte key length + key + 1-byte value
/// length + value, with at least one byte of key or value material.
pub const MIN_RECORD_SIZE: usize = 5;

/// Longest shared prefix a record can reference.
pub const MAX_PREFIX_LEN: usize = 255;

/// Record flag bitset (first byte of every record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordFlags(u8);

impl RecordFlags {
    pub const KEY_PREFIXED: u8 = 1 << 0;
    pub const KEY_COMPRESSED: u8 = 1 << 1;
    pub const VALUE_COMPRESSED: u8 = 1 << 2;

    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn insert(&mut self, flag: u8) {
        self.0 |= flag;
    }

    /// `true` if either field is compressed.
    #[must_use]
    pub fn any_compressed(self) -> bool {
        self.contains(Self::KEY_COMPRESSED | Self::VALUE_COMPRESSED)
    }
}

/// Errors produced while decoding (or building) records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Decoding was asked to parse zero bytes.
    #[error("empty record data")]
    Empty,

    /// Fewer bytes than the smallest possible record.
    #[error("record data is {len} bytes, less than the minimum {MIN_RECORD_SIZE}")]
    Truncated { len: usize },

    /// The stored prefix length is longer than the previous key.
    #[error("prefix length {prefix_len} exceeds previous key length {prev_len}")]
    BadPrefix { prefix_len: usize, prev_len: usize },

    /// A field is flagged compressed but no decompressor was supplied.
    #[error("record is compressed but no decompressor was supplied")]
    MissingDecompressor,

    /// A length varint could not be read.
    #[error("failed to read {field} length: {source}")]
    Varint {
        field: &'static str,
        #[source]
        source: VarintError,
    },

    /// A field declares more bytes than remain in the input.
    #[error("failed to read {field}: declared {expected} bytes, {available} available")]
    ShortField {
        field: &'static str,
        expected: u64,
        available: usize,
    },

    /// The compression backend rejected a field.
    #[error("failed to decompress {field}: {source}")]
    Decompress {
        field: &'static str,
        #[source]
        source: CompressError,
    },

    /// A record builder received a key that sorts before the previous one.
    #[error("key out of order: records must be appended in ascending key order")]
    OutOfOrder,

    /// An encoded record is too small to decode again.
    #[error("encoded record is {len} bytes, below the minimum {MIN_RECORD_SIZE}")]
    BelowMinimum { len: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A logical key/value record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KvPair {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// Encodes the pair relative to `prev_key`, optionally compressing the
    /// key suffix and value.
    ///
    /// Very small pairs can encode to fewer than [`MIN_RECORD_SIZE`] bytes,
    /// which [`KvPair::decode`] rejects as truncated. [`RecordBuilder`]
    /// refuses such records.
    #[must_use]
    pub fn encode(&self, prev_key: &[u8], compressor: Option<Compressor>) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.max_encoded_len());
        self.encode_into(prev_key, compressor, &mut out);
        out
    }

    /// Appends the encoding to `out`, returning the number of bytes written.
    pub fn encode_into(
        &self,
        prev_key: &[u8],
        compressor: Option<Compressor>,
        out: &mut Vec<u8>,
    ) -> usize {
        let start = out.len();
        let mut flags = RecordFlags::default();

        let prefix_len = common_prefix_len(prev_key, &self.key);
        if prefix_len > 0 {
            flags.insert(RecordFlags::KEY_PREFIXED);
        }

        let mut key: Cow<'_, [u8]> = Cow::Borrowed(&self.key[prefix_len as usize..]);
        let mut value: Cow<'_, [u8]> = Cow::Borrowed(&self.value);

        if let Some(compress) = compressor {
            let packed = compress(&key);
            if packed.len() < key.len() {
                key = Cow::Owned(packed);
                flags.insert(RecordFlags::KEY_COMPRESSED);
            }
            let packed = compress(&value);
            if packed.len() < value.len() {
                value = Cow::Owned(packed);
                flags.insert(RecordFlags::VALUE_COMPRESSED);
            }
        }

        // Writes into a Vec cannot fail.
        let _ = out.write_u8(flags.bits());
        if flags.contains(RecordFlags::KEY_PREFIXED) {
            let _ = out.write_u8(prefix_len);
        }
        encode_uvarint(key.len() as u64, out);
        out.extend_from_slice(&key);
        encode_uvarint(value.len() as u64, out);
        out.extend_from_slice(&value);

        out.len() - start
    }

    /// Upper bound of the uncompressed encoding size.
    #[must_use]
    pub fn max_encoded_len(&self) -> usize {
        2 + uvarint_len(self.key.len() as u64)
            + self.key.len()
            + uvarint_len(self.value.len() as u64)
            + self.value.len()
    }

    /// Decodes a record that occupies all of `data`.
    ///
    /// Trailing bytes after the value are ignored; use
    /// [`decode_prefix`](Self::decode_prefix) to learn how many bytes the
    /// record consumed.
    pub fn decode(
        data: &[u8],
        prev_key: &[u8],
        decompressor: Option<Decompressor>,
    ) -> Result<Self, RecordError> {
        Self::decode_prefix(data, prev_key, decompressor).map(|(kv, _)| kv)
    }

    /// Decodes the record at the front of `data`, returning it together with
    /// the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// - [`RecordError::Empty`] for empty input.
    /// - [`RecordError::Truncated`] for input shorter than [`MIN_RECORD_SIZE`].
    /// - [`RecordError::BadPrefix`] if the prefix is longer than `prev_key`.
    /// - [`RecordError::MissingDecompressor`] for compressed fields without a
    ///   decompressor.
    /// - [`RecordError::Varint`] / [`RecordError::ShortField`] for malformed
    ///   lengths.
    /// - [`RecordError::Decompress`] if the backend fails.
    pub fn decode_prefix(
        data: &[u8],
        prev_key: &[u8],
        decompressor: Option<Decompressor>,
    ) -> Result<(Self, usize), RecordError> {
        if data.is_empty() {
            return Err(RecordError::Empty);
        }
        if data.len() < MIN_RECORD_SIZE {
            return Err(RecordError::Truncated { len: data.len() });
        }

        let mut rdr = data;
        let flags = RecordFlags::from_bits(rdr.read_u8()?);

        let prefix: &[u8] = if flags.contains(RecordFlags::KEY_PREFIXED) {
            let prefix_len = rdr.read_u8()? as usize;
            if prefix_len > prev_key.len() {
                return Err(RecordError::BadPrefix {
                    prefix_len,
                    prev_len: prev_key.len(),
                });
            }
            &prev_key[..prefix_len]
        } else {
            &[]
        };

        let decompressor = if flags.any_compressed() {
            Some(decompressor.ok_or(RecordError::MissingDecompressor)?)
        } else {
            None
        };

        let mut pos = data.len() - rdr.len();
        let key_raw = read_field(data, &mut pos, "key")?;
        let value_raw = read_field(data, &mut pos, "value")?;

        let suffix = match decompressor {
            Some(decompress) if flags.contains(RecordFlags::KEY_COMPRESSED) => {
                Cow::Owned(decompress(key_raw).map_err(|source| RecordError::Decompress {
                    field: "key",
                    source,
                })?)
            }
            _ => Cow::Borrowed(key_raw),
        };
        let value = match decompressor {
            Some(decompress) if flags.contains(RecordFlags::VALUE_COMPRESSED) => {
                decompress(value_raw).map_err(|source| RecordError::Decompress {
                    field: "value",
                    source,
                })?
            }
            _ => value_raw.to_vec(),
        };

        let mut key = Vec::with_capacity(prefix.len() + suffix.len());
        key.extend_from_slice(prefix);
        key.extend_from_slice(&suffix);

        Ok((Self { key, value }, pos))
    }
}

/// Reads a `[len: uvarint][bytes]` field starting at `*pos`.
fn read_field<'a>(
    data: &'a [u8],
    pos: &mut usize,
    field: &'static str,
) -> Result<&'a [u8], RecordError> {
    let (len, n) =
        decode_uvarint(&data[*pos..]).map_err(|source| RecordError::Varint { field, source })?;
    *pos += n;
    let available = data.len() - *pos;
    if len > available as u64 {
        return Err(RecordError::ShortField {
            field,
            expected: len,
            available,
        });
    }
    let len = len as usize;
    let bytes = &data[*pos..*pos + len];
    *pos += len;
    Ok(bytes)
}

/// Length of the common leading bytes of `a` and `b`, saturating at
/// [`MAX_PREFIX_LEN`]. Zero if either is empty.
#[must_use]
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> u8 {
    a.iter()
        .zip(b)
        .take(MAX_PREFIX_LEN)
        .take_while(|(x, y)| x == y)
        .count() as u8
}

/// Canonical key ordering: unsigned lexicographic, shorter-is-less on ties.
#[must_use]
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests;

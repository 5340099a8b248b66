//! Unsigned LEB128 varints used for record key/value lengths.
//!
//! Seven payload bits per byte, least-significant group first, high bit set
//! on every byte except the last. A `u64` takes at most 10 bytes and the
//! 10th byte may only carry the single remaining bit.
//!
//! | Value range        | Bytes |
//! |--------------------|-------|
//! | 0 - 127            | 1     |
//! | 128 - 16383        | 2     |
//! | 16384 - 2097151    | 3     |
//! | ...                | ...   |
//! | 2^63 - u64::MAX    | 10    |

use thiserror::Error;

/// Maximum encoded length of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Varint decoding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarintError {
    /// Input ended before the terminating byte.
    #[error("unexpected end of varint")]
    Eof,
    /// The encoding does not fit in a `u64`.
    #[error("varint overflows u64")]
    Overflow,
}

/// Appends the varint encoding of `value` to `out`, returning the number of
/// bytes written.
pub fn encode_uvarint(mut value: u64, out: &mut Vec<u8>) -> usize {
    let mut n = 0;
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
        n += 1;
    }
    out.push(value as u8);
    n + 1
}

/// Decodes a varint from the front of `buf`, returning `(value, bytes_read)`.
pub fn decode_uvarint(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &b) in buf.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(VarintError::Overflow);
        }
        if b < 0x80 {
            if i == MAX_VARINT_LEN - 1 && b > 1 {
                return Err(VarintError::Overflow);
            }
            return Ok((value | (u64::from(b) << shift), i + 1));
        }
        value |= u64::from(b & 0x7f) << shift;
        shift += 7;
    }
    Err(VarintError::Eof)
}

/// Number of bytes [`encode_uvarint`] would write for `value`.
#[must_use]
pub fn uvarint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

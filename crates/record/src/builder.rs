//! Sequential record runs, as stored in a data page payload.
//!
//! Records in a run are prefix-compressed against each other, so they can
//! only be decoded front to back. [`RecordBuilder`] produces a run and
//! [`RecordIter`] walks one.

use compress::{Compressor, Decompressor};

use crate::{compare_keys, KvPair, RecordError, MIN_RECORD_SIZE};
use std::cmp::Ordering;

/// Appends records in ascending key order into one contiguous buffer.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    buf: Vec<u8>,
    prev_key: Vec<u8>,
    offsets: Vec<usize>,
    compressor: Option<Compressor>,
}

impl RecordBuilder {
    pub fn new(compressor: Option<Compressor>) -> Self {
        Self {
            buf: Vec::new(),
            prev_key: Vec::new(),
            offsets: Vec::new(),
            compressor,
        }
    }

    /// Encodes `kv` after the previous record and returns its byte offset
    /// within the run.
    ///
    /// # Errors
    ///
    /// - [`RecordError::OutOfOrder`] if `kv.key` sorts before the previous key.
    /// - [`RecordError::BelowMinimum`] if the encoding is too short to be
    ///   decoded again. Nothing is appended in either case.
    pub fn push(&mut self, kv: &KvPair) -> Result<usize, RecordError> {
        if !self.offsets.is_empty() && compare_keys(&kv.key, &self.prev_key) == Ordering::Less {
            return Err(RecordError::OutOfOrder);
        }
        let offset = self.buf.len();
        let written = kv.encode_into(&self.prev_key, self.compressor, &mut self.buf);
        if written < MIN_RECORD_SIZE {
            self.buf.truncate(offset);
            return Err(RecordError::BelowMinimum { len: written });
        }
        self.prev_key.clear();
        self.prev_key.extend_from_slice(&kv.key);
        self.offsets.push(offset);
        Ok(offset)
    }

    /// Bytes encoded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Number of records pushed.
    #[must_use]
    pub fn count(&self) -> usize {
        self.offsets.len()
    }

    /// Byte offset of every record, in push order.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Key of the most recently pushed record.
    #[must_use]
    pub fn last_key(&self) -> Option<&[u8]> {
        if self.offsets.is_empty() {
            None
        } else {
            Some(&self.prev_key)
        }
    }

    /// Consumes the builder, returning the encoded run.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Decodes a run of `count` records produced by [`RecordBuilder`].
///
/// Yields `Err` once and then stops if a record fails to decode.
#[derive(Debug)]
pub struct RecordIter<'a> {
    data: &'a [u8],
    pos: usize,
    remaining: usize,
    prev_key: Vec<u8>,
    decompressor: Option<Decompressor>,
}

impl<'a> RecordIter<'a> {
    pub fn new(data: &'a [u8], count: usize, decompressor: Option<Decompressor>) -> Self {
        Self {
            data,
            pos: 0,
            remaining: count,
            prev_key: Vec::new(),
            decompressor,
        }
    }

    /// Byte offset of the next record to decode.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<KvPair, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match KvPair::decode_prefix(&self.data[self.pos..], &self.prev_key, self.decompressor) {
            Ok((kv, used)) => {
                self.pos += used;
                self.remaining -= 1;
                self.prev_key.clear();
                self.prev_key.extend_from_slice(&kv.key);
                Some(Ok(kv))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

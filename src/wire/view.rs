// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Non-owning record views.

use byteorder::{ByteOrder, LittleEndian};

use super::{
    HEADER_LENGTH, INDEX_OFFSET, PAYLOAD_LENGTH_OFFSET, SEQUENCE_OFFSET, SOURCE_OFFSET,
    TIME_OFFSET, TYPE_OFFSET,
};
use crate::error::WireError;
use crate::wire::{RecordHeader, RecordKind};

/// A view over one encoded record inside a larger buffer.
///
/// The view never owns memory. Pollers bind it to the bytes of the current
/// message and the borrow ends with the callback, so a view cannot outlive a
/// buffer that is later reused. Binding validates that the header and the
/// declared payload fit; accessors then read fixed offsets without checks.
/// Calling an accessor on an unbound (reset) view panics.
#[derive(Clone, Copy, Default)]
pub struct RecordView<'a> {
    buf: &'a [u8],
}

impl<'a> RecordView<'a> {
    /// Binds a view to the record starting at `offset`.
    pub fn new(buf: &'a [u8], offset: usize) -> Result<Self, WireError> {
        let mut view = Self::default();
        view.rebind(buf, offset)?;
        Ok(view)
    }

    /// Re-targets this view at another record. On error the view is left unbound.
    pub fn rebind(&mut self, buf: &'a [u8], offset: usize) -> Result<(), WireError> {
        self.reset();
        let available = buf.len().saturating_sub(offset);
        if available < HEADER_LENGTH {
            return Err(WireError::Truncated {
                offset,
                required: HEADER_LENGTH,
                available,
            });
        }

        let header = &buf[offset..];
        let payload_len = LittleEndian::read_i32(&header[PAYLOAD_LENGTH_OFFSET..]);
        if payload_len < 0 {
            return Err(WireError::InvalidLength(payload_len));
        }

        let required = HEADER_LENGTH + payload_len as usize;
        if available < required {
            return Err(WireError::Truncated {
                offset,
                required,
                available,
            });
        }

        self.buf = &buf[offset..offset + required];
        Ok(())
    }

    /// Unbinds the view.
    pub fn reset(&mut self) {
        self.buf = &[];
    }

    pub fn is_bound(&self) -> bool {
        !self.buf.is_empty()
    }

    pub fn source(&self) -> i32 {
        LittleEndian::read_i32(&self.buf[SOURCE_OFFSET..])
    }

    pub fn sequence(&self) -> i64 {
        LittleEndian::read_i64(&self.buf[SEQUENCE_OFFSET..])
    }

    pub fn index(&self) -> i32 {
        LittleEndian::read_i32(&self.buf[INDEX_OFFSET..])
    }

    pub fn kind_code(&self) -> i32 {
        LittleEndian::read_i32(&self.buf[TYPE_OFFSET..])
    }

    pub fn kind(&self) -> RecordKind {
        RecordKind::from_code(self.kind_code())
    }

    pub fn time(&self) -> i64 {
        LittleEndian::read_i64(&self.buf[TIME_OFFSET..])
    }

    pub fn payload_len(&self) -> usize {
        self.buf.len() - HEADER_LENGTH
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.buf[HEADER_LENGTH..]
    }

    /// Total encoded length (header + payload).
    pub fn encoded_len(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            source: self.source(),
            sequence: self.sequence(),
            index: self.index(),
            kind: self.kind_code(),
            time: self.time(),
        }
    }
}

impl core::fmt::Debug for RecordView<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if !self.is_bound() {
            return f.write_str("RecordView(unbound)");
        }
        f.debug_struct("RecordView")
            .field("source", &self.source())
            .field("sequence", &self.sequence())
            .field("index", &self.index())
            .field("kind", &self.kind())
            .field("time", &self.time())
            .field("payload_len", &self.payload_len())
            .finish()
    }
}

/// Iterates the records packed back to back in a buffer.
pub struct RecordIter<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> RecordIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }

    /// Byte offset of the next record.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<RecordView<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }
        match RecordView::new(self.buf, self.offset) {
            Ok(view) => {
                self.offset += view.encoded_len();
                Some(Ok(view))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Checks that `buf` holds one or more complete records and nothing else.
/// Returns the record count.
pub fn validate_records(buf: &[u8]) -> Result<usize, WireError> {
    let mut count = 0;
    for record in RecordIter::new(buf) {
        record?;
        count += 1;
    }
    Ok(count)
}

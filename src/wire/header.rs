// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Record header and writers.

use byteorder::{ByteOrder, LittleEndian};

use super::{
    HEADER_LENGTH, INDEX_OFFSET, PAYLOAD_LENGTH_OFFSET, SEQUENCE_OFFSET, SOURCE_OFFSET,
    TIME_OFFSET, TYPE_OFFSET,
};
use crate::error::WireError;
use crate::wire::RecordKind;

/// Decoded header fields of a command or event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RecordHeader {
    pub source: i32,
    pub sequence: i64,
    pub index: i32,
    pub kind: i32,
    pub time: i64,
}

impl RecordHeader {
    pub fn new(source: i32, sequence: i64, index: i32, kind: i32, time: i64) -> Self {
        Self {
            source,
            sequence,
            index,
            kind,
            time,
        }
    }

    pub fn record_kind(&self) -> RecordKind {
        RecordKind::from_code(self.kind)
    }

    /// Encoded length of a record with this header and `payload_len` bytes.
    pub fn encoded_len(payload_len: usize) -> usize {
        HEADER_LENGTH + payload_len
    }
}

/// Writes one record into `buf` at `offset` and returns the bytes written.
pub fn write_record(
    buf: &mut [u8],
    offset: usize,
    header: &RecordHeader,
    payload: &[u8],
) -> Result<usize, WireError> {
    let payload_len =
        i32::try_from(payload.len()).map_err(|_| WireError::InvalidLength(i32::MAX))?;
    let len = RecordHeader::encoded_len(payload.len());
    let required = offset + len;
    if buf.len() < required {
        return Err(WireError::BufferTooSmall {
            required,
            available: buf.len(),
        });
    }

    let out = &mut buf[offset..required];
    LittleEndian::write_i32(&mut out[SOURCE_OFFSET..], header.source);
    LittleEndian::write_i64(&mut out[SEQUENCE_OFFSET..], header.sequence);
    LittleEndian::write_i32(&mut out[INDEX_OFFSET..], header.index);
    LittleEndian::write_i32(&mut out[TYPE_OFFSET..], header.kind);
    LittleEndian::write_i64(&mut out[TIME_OFFSET..], header.time);
    LittleEndian::write_i32(&mut out[PAYLOAD_LENGTH_OFFSET..], payload_len);
    out[HEADER_LENGTH..].copy_from_slice(payload);

    Ok(len)
}

/// Appends one encoded record to the end of `out`.
pub fn encode_record(
    out: &mut Vec<u8>,
    header: &RecordHeader,
    payload: &[u8],
) -> Result<usize, WireError> {
    let start = out.len();
    out.resize(start + RecordHeader::encoded_len(payload.len()), 0);
    match write_record(out, start, header, payload) {
        Ok(written) => Ok(written),
        Err(e) => {
            out.truncate(start);
            Err(e)
        }
    }
}

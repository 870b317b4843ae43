// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Wire Record Format
//!
//! Commands and events share one fixed-layout, little-endian header followed
//! by an opaque payload:
//!
//! ```text
//! offset 0   i32  source
//! offset 4   i64  sequence
//! offset 12  i32  index
//! offset 16  i32  type
//! offset 20  i64  time
//! offset 28  i32  payload length
//! offset 32  ..   payload
//! ```
//!
//! Records are read through [`RecordView`], a non-owning view bound to a
//! slice of a log buffer for the duration of one poll callback.

pub mod header;
pub mod kind;
pub mod view;

pub use header::{encode_record, write_record, RecordHeader};
pub use kind::{AdminKind, RecordKind};
pub use view::{validate_records, RecordIter, RecordView};

pub const SOURCE_OFFSET: usize = 0;
pub const SEQUENCE_OFFSET: usize = 4;
pub const INDEX_OFFSET: usize = 12;
pub const TYPE_OFFSET: usize = 16;
pub const TIME_OFFSET: usize = 20;
pub const PAYLOAD_LENGTH_OFFSET: usize = 28;
pub const HEADER_LENGTH: usize = 32;

/// Commands and events share the record layout; the aliases keep call sites
/// readable.
pub type Command<'a> = RecordView<'a>;
pub type Event<'a> = RecordView<'a>;

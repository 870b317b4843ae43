// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use sequent_kernel::log::{LogPosition, MessageLog};
use sequent_kernel::RecordView;
use sequent_persistence::load_log;
use serde::Serialize;

use super::{format_millis, table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRow {
    /// Byte offset of the frame holding the record.
    pub frame: u64,
    pub offset: u64,
    pub source: i32,
    pub sequence: i64,
    pub index: i32,
    pub kind: String,
    pub time: i64,
    pub payload_len: usize,
}

/// Reads up to `limit` records of the log at `path`, skipping the first
/// `skip`.
pub fn collect(path: &Path, skip: usize, limit: usize) -> anyhow::Result<Vec<RecordRow>> {
    let log = load_log(path)?;
    let mut rows = Vec::new();
    let mut position = LogPosition::START;
    let mut seen = 0usize;

    while rows.len() < limit {
        let at = position;
        let mut row = None;
        let read = log.poll(&mut position, &mut |r: RecordView<'_>| {
            row = Some(RecordRow {
                frame: at.frame,
                offset: at.offset,
                source: r.source(),
                sequence: r.sequence(),
                index: r.index(),
                kind: r.kind().to_string(),
                time: r.time(),
                payload_len: r.payload_len(),
            });
        })?;
        if read == 0 {
            break;
        }
        seen += 1;
        if seen > skip {
            rows.extend(row);
        }
    }
    Ok(rows)
}

pub fn run(path: &Path, skip: usize, limit: usize, json: bool) -> anyhow::Result<()> {
    let rows = collect(path, skip, limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = table(vec!["Frame", "Offset", "Source", "Sequence", "Index", "Type", "Time", "Payload"]);
    for row in &rows {
        table.add_row(vec![
            row.frame.to_string(),
            row.offset.to_string(),
            row.source.to_string(),
            row.sequence.to_string(),
            row.index.to_string(),
            row.kind.clone(),
            format_millis(row.time),
            format!("{} bytes", row.payload_len),
        ]);
    }
    println!("\n{} ({} records shown)", path.display(), rows.len());
    println!("{table}\n");
    Ok(())
}

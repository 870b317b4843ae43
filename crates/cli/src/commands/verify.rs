// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use anyhow::bail;
use sequent_kernel::log::scan_frames;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub frames: usize,
    pub records: usize,
    /// End of the last intact frame.
    pub valid_bytes: usize,
    pub file_bytes: usize,
    pub problem: Option<String>,
}

/// Walks every frame of the log file and checks its checksum and records.
pub fn check(path: &Path) -> anyhow::Result<VerifyReport> {
    let bytes = std::fs::read(path)?;
    let scan = scan_frames(&bytes);
    Ok(VerifyReport {
        frames: scan.frames.len(),
        records: scan.frames.iter().map(|f| f.records).sum(),
        valid_bytes: scan.valid_end,
        file_bytes: bytes.len(),
        problem: scan.stop_reason,
    })
}

pub fn run(path: &Path, json: bool) -> anyhow::Result<()> {
    let report = check(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.problem.is_none() {
        println!("\n✅ VERIFIED\n");
        println!("Frames:  {}", report.frames);
        println!("Records: {}", report.records);
        println!("Used:    {} of {} bytes\n", report.valid_bytes, report.file_bytes);
    } else {
        println!("\n❌ CORRUPTED\n");
        println!("Intact frames: {}", report.frames);
    }

    match report.problem {
        Some(problem) => bail!("{}: {}", path.display(), problem),
        None => Ok(()),
    }
}

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use sequent_cli::commands::{inspect, timers, verify};
use sequent_kernel::log::MessageLog;
use sequent_kernel::timer::Timer;
use sequent_kernel::wire::AdminKind;
use sequent_kernel::RecordHeader;
use sequent_persistence::open_log;
use tempfile::tempdir;

fn write_event_log(path: &Path) {
    let log = open_log(path, 1024).unwrap();
    let started = |id: i64, timeout: i64| Timer::new(7, id, timeout).encode();
    log.append_record(&RecordHeader::new(1, 1, 0, 100, 1_700_000_000_000), b"hello").unwrap();
    log.append_record(&RecordHeader::new(1, 2, 0, AdminKind::TimerStarted.code(), 0), &started(1, 5_000))
        .unwrap();
    log.append_record(&RecordHeader::new(1, 3, 0, AdminKind::TimerStarted.code(), 0), &started(2, 9_000))
        .unwrap();
    log.append_record(&RecordHeader::new(0, 1, 0, AdminKind::TimerExpired.code(), 0), &started(1, 5_000))
        .unwrap();
}

#[test]
fn test_inspect_lists_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");
    write_event_log(&path);

    let rows = inspect::collect(&path, 0, 100).unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!((rows[0].source, rows[0].sequence, rows[0].payload_len), (1, 1, 5));
    assert_eq!(rows[0].frame, 0);
    assert_eq!(rows[3].kind, "TIMER_EXPIRED");

    let page = inspect::collect(&path, 1, 2).unwrap();
    assert_eq!(page.iter().map(|r| r.sequence).collect::<Vec<_>>(), vec![2, 3]);
    assert!(inspect::run(&path, 0, 10, false).is_ok());
}

#[test]
fn test_timers_rebuilds_pending_registry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");
    write_event_log(&path);

    let pending = timers::collect(&path).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!((pending[0].id, pending[0].timer_type, pending[0].timeout), (2, 7, 9_000));
    assert!(timers::run(&path, true).is_ok());
}

#[test]
fn test_verify_detects_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");
    write_event_log(&path);

    let report = verify::check(&path).unwrap();
    assert_eq!((report.frames, report.records), (4, 4));
    assert!(report.problem.is_none());
    assert!(verify::run(&path, false).is_ok());

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[30] ^= 0x55;
    std::fs::write(&path, &bytes).unwrap();

    let report = verify::check(&path).unwrap();
    assert_eq!(report.frames, 0);
    assert!(report.problem.unwrap().contains("checksum"));
    assert!(verify::run(&path, true).is_err());
}

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use crate::config::MAX_FRAME_LENGTH;
use crate::error::LogError;
use crate::log::{
    AppendOutcome, InMemoryLog, LogPoller, LogPosition, MessageLog, Outcome, SequencePolicy,
    SourceTrackingAppender,
};
use crate::sequence::SequenceGenerator;
use crate::wire::{encode_record, RecordHeader, RecordView};

fn header(source: i32, sequence: i64) -> RecordHeader {
    RecordHeader::new(source, sequence, 0, 1, 1_000 + sequence)
}

fn collect(log: &dyn MessageLog) -> Vec<RecordHeader> {
    let mut seen = Vec::new();
    let mut position = LogPosition::START;
    while log
        .poll(&mut position, &mut |r: RecordView<'_>| seen.push(r.header()))
        .unwrap()
        > 0
    {}
    seen
}

#[test]
fn test_poll_returns_records_in_append_order() {
    let log = InMemoryLog::in_memory();
    let mut expected = Vec::new();
    for i in 1..=200 {
        let h = header((i % 3) as i32 + 1, i);
        log.append_record(&h, &i.to_le_bytes()).unwrap();
        expected.push(h);
    }
    assert_eq!(collect(&log), expected);
}

#[test]
fn test_multi_record_frame_is_read_record_by_record() {
    let log = InMemoryLog::in_memory();
    let mut frame = Vec::new();
    for i in 0..3 {
        encode_record(&mut frame, &RecordHeader::new(1, 1, i, 5, 0), &[i as u8; 3]).unwrap();
    }
    log.append(&frame).unwrap();
    log.append_record(&header(1, 2), b"next").unwrap();

    let indices: Vec<(i64, i32)> = collect(&log).iter().map(|h| (h.sequence, h.index)).collect();
    assert_eq!(indices, vec![(1, 0), (1, 1), (1, 2), (2, 0)]);
    assert_eq!(log.frame_count(), 2);
}

#[test]
fn test_peek_leaves_position_unchanged() {
    let log = InMemoryLog::in_memory();
    log.append_record(&header(1, 1), b"a").unwrap();
    log.append_record(&header(1, 2), b"b").unwrap();

    let mut position = LogPosition::START;
    let mut peek = |_: RecordView<'_>| Outcome::Peek;
    assert_eq!(log.peek_or_poll(&mut position, &mut peek).unwrap(), 1);
    assert_eq!(log.peek_or_poll(&mut position, &mut peek).unwrap(), 1);
    assert_eq!(position, LogPosition::START);

    let mut sequences = Vec::new();
    let mut poll = |r: RecordView<'_>| {
        sequences.push(r.sequence());
        Outcome::Poll
    };
    while log.peek_or_poll(&mut position, &mut poll).unwrap() > 0 {}
    assert_eq!(sequences, vec![1, 2]);
}

#[test]
fn test_empty_log_and_empty_append() {
    let log = InMemoryLog::in_memory();
    log.append(&[]).unwrap();
    let mut position = LogPosition::START;
    assert_eq!(log.poll(&mut position, &mut |_: RecordView<'_>| {}).unwrap(), 0);
    assert_eq!(log.frame_count(), 0);
}

#[test]
fn test_poller_drain_and_seek() {
    let log: Arc<dyn MessageLog> = Arc::new(InMemoryLog::in_memory());
    for i in 1..=5 {
        log.append_record(&header(2, i), b"x").unwrap();
    }
    let mut poller = LogPoller::new(log.clone());
    let mut count = 0;
    assert_eq!(poller.drain(&mut |_: RecordView<'_>| count += 1).unwrap(), 5);
    assert_eq!(count, 5);

    let end = poller.position();
    log.append_record(&header(2, 6), b"y").unwrap();
    assert_eq!(poller.drain(&mut |_: RecordView<'_>| {}).unwrap(), 1);

    poller.seek(end);
    let mut last = 0;
    poller.drain(&mut |r: RecordView<'_>| last = r.sequence()).unwrap();
    assert_eq!(last, 6);
}

#[test]
fn test_duplicate_append_lands_once() {
    let log: Arc<dyn MessageLog> = Arc::new(InMemoryLog::in_memory());
    let appender = SourceTrackingAppender::new(log.clone(), SequencePolicy::DropStale);

    assert_eq!(appender.append_record(&header(7, 1), b"a").unwrap(), AppendOutcome::Appended);
    assert_eq!(appender.append_record(&header(7, 1), b"a").unwrap(), AppendOutcome::Duplicate);
    assert_eq!(appender.append_record(&header(7, 2), b"b").unwrap(), AppendOutcome::Appended);
    assert_eq!(appender.append_record(&header(7, 1), b"a").unwrap(), AppendOutcome::Duplicate);
    // Other sources have their own sequence space.
    assert_eq!(appender.append_record(&header(8, 1), b"c").unwrap(), AppendOutcome::Appended);

    let seen: Vec<(i32, i64)> = collect(log.as_ref()).iter().map(|h| (h.source, h.sequence)).collect();
    assert_eq!(seen, vec![(7, 1), (7, 2), (8, 1)]);
    assert_eq!(appender.last_sequence(7), Some(2));
}

#[test]
fn test_increasing_sequences_always_append() {
    let log: Arc<dyn MessageLog> = Arc::new(InMemoryLog::in_memory());
    let appender = SourceTrackingAppender::new(log.clone(), SequencePolicy::DropStale);
    for sequence in [1, 2, 5, 6, 100] {
        assert_eq!(
            appender.append_record(&header(1, sequence), b"").unwrap(),
            AppendOutcome::Appended
        );
    }
    assert_eq!(collect(log.as_ref()).len(), 5);
}

#[test]
fn test_strict_policy_rejects_stale_sequence() {
    let log: Arc<dyn MessageLog> = Arc::new(InMemoryLog::in_memory());
    let appender = SourceTrackingAppender::new(log, SequencePolicy::Strict);
    appender.append_record(&header(3, 4), b"").unwrap();

    match appender.append_record(&header(3, 4), b"") {
        Err(LogError::SequenceViolation {
            source_id,
            sequence,
            last,
        }) => assert_eq!((source_id, sequence, last), (3, 4, 4)),
        other => panic!("expected sequence violation, got {:?}", other),
    }
}

#[test]
fn test_recovered_appender_remembers_sources() {
    let log: Arc<dyn MessageLog> = Arc::new(InMemoryLog::in_memory());
    log.append_record(&header(1, 3), b"").unwrap();
    log.append_record(&header(2, 9), b"").unwrap();
    log.append_record(&header(1, 4), b"").unwrap();

    let appender = SourceTrackingAppender::recover(log, SequencePolicy::DropStale).unwrap();
    assert_eq!(appender.last_sequence(1), Some(4));
    assert_eq!(appender.last_sequence(2), Some(9));
    assert_eq!(appender.last_sequence(3), None);
    assert_eq!(appender.append_record(&header(2, 9), b"").unwrap(), AppendOutcome::Duplicate);
}

#[test]
fn test_last_sequence_at_max_drops_everything_after() {
    let log: Arc<dyn MessageLog> = Arc::new(InMemoryLog::in_memory());
    let appender = SourceTrackingAppender::new(log.clone(), SequencePolicy::DropStale);
    let at = |sequence| RecordHeader::new(6, sequence, 0, 1, 0);

    assert_eq!(appender.append_record(&at(i64::MAX - 1), b"").unwrap(), AppendOutcome::Appended);
    assert_eq!(appender.append_record(&at(i64::MAX), b"").unwrap(), AppendOutcome::Appended);
    assert_eq!(appender.append_record(&at(i64::MAX), b"").unwrap(), AppendOutcome::Duplicate);
    assert_eq!(appender.append_record(&at(1), b"").unwrap(), AppendOutcome::Duplicate);
    assert_eq!(collect(log.as_ref()).len(), 2);
}

#[test]
fn test_concurrent_producers_keep_per_source_order() {
    const PRODUCERS: i32 = 4;
    const PER_PRODUCER: i64 = 250;

    let log = Arc::new(InMemoryLog::in_memory());
    let appender = SourceTrackingAppender::new(log.clone(), SequencePolicy::Strict);

    std::thread::scope(|scope| {
        for source in 1..=PRODUCERS {
            let appender = &appender;
            scope.spawn(move || {
                for sequence in 1..=PER_PRODUCER {
                    let outcome = appender
                        .append_record(&header(source, sequence), &sequence.to_le_bytes())
                        .unwrap();
                    assert_eq!(outcome, AppendOutcome::Appended);
                }
            });
        }
    });

    let seen = collect(log.as_ref());
    assert_eq!(seen.len(), (PRODUCERS as i64 * PER_PRODUCER) as usize);
    for source in 1..=PRODUCERS {
        let sequences: Vec<i64> = seen
            .iter()
            .filter(|h| h.source == source)
            .map(|h| h.sequence)
            .collect();
        assert_eq!(sequences, (1..=PER_PRODUCER).collect::<Vec<_>>());
    }

    let scan = log.scan();
    assert_eq!(scan.frames.len(), seen.len());
    assert!(scan.stop_reason.is_none());
    assert_eq!(scan.valid_end, log.committed_len());
}

#[test]
fn test_producers_sharing_a_generator_never_collide() {
    let log = Arc::new(InMemoryLog::in_memory());
    let appender = SourceTrackingAppender::new(log.clone(), SequencePolicy::Strict);
    let sequence = SequenceGenerator::new();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let (appender, sequence) = (&appender, &sequence);
            scope.spawn(move || {
                for _ in 0..200 {
                    appender.append_next(0, sequence, -2, 0, &[0u8; 12]).unwrap();
                }
            });
        }
    });

    let sequences: Vec<i64> = collect(log.as_ref()).iter().map(|h| h.sequence).collect();
    assert_eq!(sequences, (1..=800).collect::<Vec<_>>());
    assert_eq!(appender.last_sequence(0), Some(800));
}

#[test]
fn test_append_next_refuses_oversized_payload_without_using_a_sequence() {
    let log: Arc<dyn MessageLog> = Arc::new(InMemoryLog::in_memory());
    let appender = SourceTrackingAppender::new(log.clone(), SequencePolicy::DropStale);
    let sequence = SequenceGenerator::new();

    let err = appender
        .append_next(1, &sequence, 1, 0, &vec![0u8; MAX_FRAME_LENGTH])
        .unwrap_err();
    assert!(matches!(err, LogError::FrameTooLarge(_)));
    assert!(err.is_rejection());
    assert_eq!(sequence.peek(), 1);

    appender.append_next(1, &sequence, 1, 0, b"ok").unwrap();
    let seen: Vec<i64> = collect(log.as_ref()).iter().map(|h| h.sequence).collect();
    assert_eq!(seen, vec![1]);
}

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use sequent_kernel::log::{LogPosition, MessageLog};
use sequent_kernel::timer::{lock, AdminEventApplier, Timers};
use sequent_kernel::RecordView;
use sequent_persistence::load_log;
use serde::Serialize;

use super::{format_millis, table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerRow {
    pub id: i64,
    pub timer_type: i32,
    pub timeout: i64,
}

/// Rebuilds the timer registry by replaying the admin events of an event
/// log. Returns the timers still pending at the end of the log.
pub fn collect(event_log: &Path) -> anyhow::Result<Vec<TimerRow>> {
    let log = load_log(event_log)?;
    let mut applier = AdminEventApplier::new(Timers::shared());
    let mut position = LogPosition::START;
    let mut failure = None;

    while log.poll(&mut position, &mut |e: RecordView<'_>| {
        if let Err(err) = applier.apply(e) {
            failure.get_or_insert(err);
        }
    })? > 0
    {}
    if let Some(err) = failure {
        return Err(err.into());
    }

    let timers = lock(applier.timers());
    Ok(timers
        .iter()
        .map(|t| TimerRow {
            id: t.id,
            timer_type: t.timer_type,
            timeout: t.timeout,
        })
        .collect())
}

pub fn run(event_log: &Path, json: bool) -> anyhow::Result<()> {
    let rows = collect(event_log)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = table(vec!["Timer", "Type", "Due"]);
    for row in &rows {
        table.add_row(vec![row.id.to_string(), row.timer_type.to_string(), format_millis(row.timeout)]);
    }
    println!("\n{} pending timers", rows.len());
    println!("{table}\n");
    Ok(())
}

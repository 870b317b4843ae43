// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Exception handling for per-message failures.
//!
//! Failures inside application code never stop the duty cycle. They are
//! reported here and the pipeline carries on according to its policy.

use crate::wire::RecordView;

pub trait ExceptionHandler: Send + Sync {
    fn on_command_error(&self, command: RecordView<'_>, error: &anyhow::Error);

    fn on_event_error(&self, event: RecordView<'_>, error: &anyhow::Error);

    fn on_output_error(&self, event: RecordView<'_>, error: &anyhow::Error);
}

/// Logs every failure at error level and continues.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingExceptionHandler;

impl ExceptionHandler for LoggingExceptionHandler {
    fn on_command_error(&self, command: RecordView<'_>, error: &anyhow::Error) {
        metrics::increment_counter!("sequent_processing_errors_total", "stage" => "command");
        tracing::error!(
            "Command processing failed: source={} sequence={} type={}: {:#}",
            command.source(),
            command.sequence(),
            command.kind(),
            error
        );
    }

    fn on_event_error(&self, event: RecordView<'_>, error: &anyhow::Error) {
        metrics::increment_counter!("sequent_processing_errors_total", "stage" => "event");
        tracing::error!(
            "Event application failed: source={} sequence={} index={} type={}: {:#}",
            event.source(),
            event.sequence(),
            event.index(),
            event.kind(),
            error
        );
    }

    fn on_output_error(&self, event: RecordView<'_>, error: &anyhow::Error) {
        metrics::increment_counter!("sequent_processing_errors_total", "stage" => "output");
        tracing::error!(
            "Output publish failed: source={} sequence={} index={}: {:#}",
            event.source(),
            event.sequence(),
            event.index(),
            error
        );
    }
}

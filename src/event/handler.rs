// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event handler.

use std::sync::Arc;

use super::{CommandLoopback, EventApplier, Output};
use crate::exception::ExceptionHandler;
use crate::log::MessageHandler;
use crate::timer::AdminEventApplier;
use crate::wire::RecordView;

pub struct EventHandler {
    output: Box<dyn Output>,
    admin: AdminEventApplier,
    applier: Box<dyn EventApplier>,
    loopback: Box<dyn CommandLoopback>,
    exceptions: Arc<dyn ExceptionHandler>,
    applied: u64,
}

impl EventHandler {
    pub fn new(
        output: Box<dyn Output>,
        admin: AdminEventApplier,
        applier: Box<dyn EventApplier>,
        loopback: Box<dyn CommandLoopback>,
        exceptions: Arc<dyn ExceptionHandler>,
    ) -> Self {
        Self {
            output,
            admin,
            applier,
            loopback,
            exceptions,
            applied: 0,
        }
    }

    /// Events handled so far.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Swaps the loopback and output, returning the previous ones. Recovery
    /// replays with a discarding loopback and no output, then restores the
    /// live ones.
    pub fn replace_sinks(
        &mut self,
        output: Box<dyn Output>,
        loopback: Box<dyn CommandLoopback>,
    ) -> (Box<dyn Output>, Box<dyn CommandLoopback>) {
        (
            std::mem::replace(&mut self.output, output),
            std::mem::replace(&mut self.loopback, loopback),
        )
    }
}

impl MessageHandler for EventHandler {
    fn on_message(&mut self, event: RecordView<'_>) {
        if let Err(e) = self.output.publish(event) {
            self.exceptions.on_output_error(event, &e);
        }

        if let Err(e) = self.admin.apply(event) {
            self.exceptions.on_event_error(event, &anyhow::Error::from(e));
        }

        if let Err(e) = self.applier.on_event(event, self.loopback.as_mut()) {
            self.exceptions.on_event_error(event, &e);
        }
        self.applied += 1;
    }
}

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! sequent-kernel: the sequencing core of an embeddable event-sourcing runtime.
//!
//! Commands enter through [`input::Input`]s, are stamped by the
//! [`sequencer::Sequencer`] and appended to a command log. The command step
//! peeks each command, runs the application's [`command::CommandProcessor`]
//! and commits the routed events to the event log as one frame. The event
//! step applies committed events through [`event::EventApplier`]. Everything
//! runs inside one cooperative [`duty::DutyCycle`].

pub mod admin;
pub mod command;
pub mod config;
pub mod duty;
pub mod error;
pub mod event;
pub mod exception;
pub mod input;
pub mod log;
pub mod raft;
pub mod recovery;
pub mod runtime;
pub mod sequence;
pub mod sequencer;
pub mod timer;
pub mod wire;

pub use runtime::{Runtime, RuntimeBuilder};
pub use wire::{RecordHeader, RecordKind, RecordView};

#[cfg(test)]
pub mod tests;

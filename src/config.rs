// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Source id reserved for administrative commands (timers, loopback).
/// Application inputs must use any other id.
pub const ADMIN_SOURCE: i32 = 0;

/// First sequence number handed out by a fresh generator.
pub const INITIAL_SEQUENCE: i64 = 1;

/// Default capacity in bytes of a freshly created log region.
pub const DEFAULT_REGION_CAPACITY: usize = 64 * 1024;

/// Upper bound on a single frame (one append) in a region log.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

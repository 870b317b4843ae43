// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod api;
pub mod config;
pub mod counter;
pub mod errors;
pub mod input;
pub mod node;
pub mod server;
pub mod telemetry;

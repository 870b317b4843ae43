// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod duty_tests;
pub mod log_tests;
pub mod raft_tests;

// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for the Ceph command surface and health monitor.
//!
//! These tests verify the command surface and background monitor against a
//! scripted toolbox WITHOUT requiring a live cluster. Command output is
//! canned from real toolbox sessions.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_monitor_captures_error_snapshot
//!
//! # Run with verbose output
//! cargo test --test functional -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! - **Command tests**: health/capacity/credential/balancer queries and
//!   their derivations over canned output
//! - **Monitor tests**: the background sampler's sentinel detection and
//!   snapshot capture, driven with paused time

mod command_tests;
mod mock_toolbox;
mod monitor_tests;

// Re-export for use in tests
pub use mock_toolbox::*;

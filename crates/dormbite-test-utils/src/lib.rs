// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Dormbite integration tests.
//!
//! Provides a recording messenger and a harness that wires the engine to a
//! throwaway SQLite store, so flows run without a chat platform.
//!
//! # Components
//!
//! - [`MockMessenger`] - Messenger that records every outbound call
//! - [`TestHarness`] - Engine, store and messenger with event helpers

pub mod harness;
pub mod mock_messenger;

pub use harness::{DISPATCH_CHAT, TestHarness};
pub use mock_messenger::{MockMessenger, Outbound};

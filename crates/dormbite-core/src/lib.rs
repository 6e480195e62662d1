// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Dormbite delivery bot.
//!
//! This crate provides the error type, the domain types, the distance
//! utility, and the adapter traits the rest of the workspace builds on.

pub mod error;
pub mod geo;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::DormbiteError;
pub use geo::haversine;
pub use types::{AdapterType, GeoPoint, HealthStatus, OrderId, UserId};

pub use traits::{Messenger, PluginAdapter, Store};

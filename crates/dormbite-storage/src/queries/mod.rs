// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions, one module per table group.

pub mod contracts;
pub mod customers;
pub mod menu;
pub mod moderation;
pub mod orders;
pub mod positions;
pub mod ratings;

// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery coordination engine for Dormbite.
//!
//! [`Engine`] consumes normalized [`InboundEvent`](dormbite_core::types::InboundEvent)s
//! from a chat adapter and drives registration, ordering, the dispatch
//! handshake and the live-location relay against a [`Store`](dormbite_core::Store)
//! and a [`Messenger`](dormbite_core::Messenger).

pub mod accounts;
mod admin;
pub mod callback;
mod conversation;
mod coordinator;
pub mod engine;
pub mod metrics;
pub mod ordering;
mod photos;
mod recovery;
pub mod registration;
mod relay;
pub mod session;
pub mod throttle;

pub use callback::Action;
pub use engine::{Ack, Engine};
pub use metrics::register_metrics;
pub use ordering::OrderDraft;
pub use registration::Registration;
pub use session::OrderSession;

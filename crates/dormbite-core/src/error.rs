// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Dormbite delivery bot.

use thiserror::Error;

use crate::types::{OrderId, UserId};

/// The primary error type used across all Dormbite adapter traits and core operations.
#[derive(Debug, Error)]
pub enum DormbiteError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Messaging endpoint errors (send failure, expired message, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The actor is not allowed to perform the action (wrong chat or wrong identity).
    #[error("{actor} is not authorized to {action}")]
    Unauthorized { action: String, actor: String },

    /// The order session cannot take the requested step from its current stage.
    #[error("order {order_id} cannot {action} while {from}")]
    InvalidTransition {
        order_id: OrderId,
        from: String,
        action: String,
    },

    /// No order row exists for the id.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// No customer row exists for the id.
    #[error("customer {0} not found")]
    CustomerNotFound(UserId),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DormbiteError {
    /// Shorthand for a channel error without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// True for errors the user caused and should see explained, rather than
    /// failures of the bot itself.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. } | Self::InvalidTransition { .. }
        )
    }
}

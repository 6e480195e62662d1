// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound side of the chat platform.

use async_trait::async_trait;

use crate::error::DormbiteError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatId, FileRef, GeoPoint, Markup, MessageRef};

/// Sends, edits and deletes messages on the chat platform.
///
/// Inbound events are pushed into the engine by the adapter's own run loop,
/// so this trait only covers the calls the engine makes outward.
#[async_trait]
pub trait Messenger: PluginAdapter {
    /// Sends a text message, optionally with buttons or a keyboard.
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<MessageRef, DormbiteError>;

    /// Replaces the text (and inline buttons) of a previously sent message.
    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<(), DormbiteError>;

    /// Replaces only the inline buttons. `None` removes them.
    async fn edit_markup(
        &self,
        message: MessageRef,
        markup: Option<Markup>,
    ) -> Result<(), DormbiteError>;

    /// Sends a location. With `live_period` set it becomes a live location
    /// that can be moved with [`Messenger::edit_live_location`].
    async fn send_location(
        &self,
        chat: ChatId,
        point: GeoPoint,
        live_period: Option<u32>,
    ) -> Result<MessageRef, DormbiteError>;

    /// Moves a live-location message. Fails once the live period expired.
    async fn edit_live_location(
        &self,
        message: MessageRef,
        point: GeoPoint,
    ) -> Result<(), DormbiteError>;

    /// Sends a photo by platform file reference.
    async fn send_photo(
        &self,
        chat: ChatId,
        file: &FileRef,
        caption: Option<&str>,
        markup: Option<Markup>,
    ) -> Result<MessageRef, DormbiteError>;

    /// Deletes a message.
    async fn delete_message(&self, message: MessageRef) -> Result<(), DormbiteError>;

    /// Acknowledges a button press, optionally with a toast or alert.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), DormbiteError>;
}

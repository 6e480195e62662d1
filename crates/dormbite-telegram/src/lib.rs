// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram adapter for the Dormbite delivery bot.
//!
//! [`TelegramMessenger`] implements [`Messenger`] over the Bot API via
//! teloxide, and [`runner::run`] feeds polled or webhook updates into the
//! engine.

pub mod handler;
pub mod markup;
pub mod runner;

use async_trait::async_trait;
use dormbite_config::model::TelegramConfig;
use dormbite_core::error::DormbiteError;
use dormbite_core::traits::{Messenger, PluginAdapter};
use dormbite_core::types::{
    AdapterType, ChatId, FileRef, GeoPoint, HealthStatus, Markup, MessageRef,
};
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, FileId, InputFile, LivePeriod, MessageId, Seconds,
};
use tracing::debug;

pub use runner::run;

/// Telegram implementation of [`Messenger`].
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    /// Creates the messenger. Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, DormbiteError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            DormbiteError::Config("telegram.bot_token is required for Telegram adapter".into())
        })?;

        if token.is_empty() {
            return Err(DormbiteError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        Ok(Self {
            bot: Bot::new(token),
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn chat(id: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(id.0)
}

fn sent(msg: &Message) -> MessageRef {
    MessageRef {
        chat: ChatId(msg.chat.id.0),
        message_id: msg.id.0,
    }
}

fn request_failed(what: &str, e: RequestError) -> DormbiteError {
    DormbiteError::Channel {
        message: format!("failed to {what}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Edits that change nothing are rejected by Telegram; they are not failures here.
fn unless_not_modified(what: &str, result: Result<Message, RequestError>) -> Result<(), DormbiteError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.to_string().contains("message is not modified") => {
            debug!(what, "edit skipped, content unchanged");
            Ok(())
        }
        Err(e) => Err(request_failed(what, e)),
    }
}

#[async_trait]
impl PluginAdapter for TelegramMessenger {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, DormbiteError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), DormbiteError> {
        debug!("Telegram messenger shutting down");
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        to: ChatId,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<MessageRef, DormbiteError> {
        let mut request = self.bot.send_message(chat(to), text);
        if let Some(markup) = &markup {
            request = request.reply_markup(markup::reply_markup(markup));
        }
        let msg = request
            .await
            .map_err(|e| request_failed("send message", e))?;
        Ok(sent(&msg))
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<(), DormbiteError> {
        let mut request =
            self.bot
                .edit_message_text(chat(message.chat), MessageId(message.message_id), text);
        if let Some(keyboard) = markup::edit_markup(markup.as_ref()) {
            request = request.reply_markup(keyboard);
        }
        unless_not_modified("edit message", request.await)
    }

    async fn edit_markup(
        &self,
        message: MessageRef,
        markup: Option<Markup>,
    ) -> Result<(), DormbiteError> {
        let mut request = self
            .bot
            .edit_message_reply_markup(chat(message.chat), MessageId(message.message_id));
        if let Some(keyboard) = markup::edit_markup(markup.as_ref()) {
            request = request.reply_markup(keyboard);
        }
        unless_not_modified("edit buttons", request.await)
    }

    async fn send_location(
        &self,
        to: ChatId,
        point: GeoPoint,
        live_period: Option<u32>,
    ) -> Result<MessageRef, DormbiteError> {
        let mut request = self.bot.send_location(chat(to), point.lat, point.lon);
        if let Some(secs) = live_period {
            request = request.live_period(LivePeriod::Timeframe(Seconds::from_seconds(secs)));
        }
        let msg = request
            .await
            .map_err(|e| request_failed("send location", e))?;
        Ok(sent(&msg))
    }

    async fn edit_live_location(
        &self,
        message: MessageRef,
        point: GeoPoint,
    ) -> Result<(), DormbiteError> {
        let result = self
            .bot
            .edit_message_live_location(
                chat(message.chat),
                MessageId(message.message_id),
                point.lat,
                point.lon,
            )
            .await;
        unless_not_modified("move live location", result)
    }

    async fn send_photo(
        &self,
        to: ChatId,
        file: &FileRef,
        caption: Option<&str>,
        markup: Option<Markup>,
    ) -> Result<MessageRef, DormbiteError> {
        let mut request = self
            .bot
            .send_photo(chat(to), InputFile::file_id(FileId(file.0.clone())));
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        if let Some(markup) = &markup {
            request = request.reply_markup(markup::reply_markup(markup));
        }
        let msg = request
            .await
            .map_err(|e| request_failed("send photo", e))?;
        Ok(sent(&msg))
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), DormbiteError> {
        self.bot
            .delete_message(chat(message.chat), MessageId(message.message_id))
            .await
            .map_err(|e| request_failed("delete message", e))?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), DormbiteError> {
        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(text) = text {
            request = request.text(text).show_alert(alert);
        }
        request
            .await
            .map_err(|e| request_failed("answer button press", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(str::to_string),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn new_requires_bot_token() {
        assert!(TelegramMessenger::new(&config(None)).is_err());
    }

    #[test]
    fn new_rejects_empty_token() {
        assert!(TelegramMessenger::new(&config(Some(""))).is_err());
    }

    #[test]
    fn new_accepts_valid_token() {
        let token = "123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11";
        assert!(TelegramMessenger::new(&config(Some(token))).is_ok());
    }

    #[test]
    fn plugin_adapter_metadata() {
        let messenger = TelegramMessenger::new(&config(Some("test:token"))).unwrap();
        assert_eq!(messenger.name(), "telegram");
        assert_eq!(messenger.version(), semver::Version::new(0, 1, 0));
        assert_eq!(messenger.adapter_type(), AdapterType::Channel);
    }
}

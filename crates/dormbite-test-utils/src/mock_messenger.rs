// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messenger for deterministic testing.
//!
//! `MockMessenger` implements `Messenger` by recording every outbound call
//! in order. Message ids are allocated from a single counter so replies and
//! edits can be addressed exactly like on a real platform.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use dormbite_core::traits::{Messenger, PluginAdapter};
use dormbite_core::types::{
    AdapterType, ChatId, FileRef, GeoPoint, HealthStatus, Markup, MessageRef,
};
use dormbite_core::DormbiteError;

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text {
        message: MessageRef,
        text: String,
        markup: Option<Markup>,
    },
    EditText {
        message: MessageRef,
        text: String,
        markup: Option<Markup>,
    },
    EditMarkup {
        message: MessageRef,
        markup: Option<Markup>,
    },
    Location {
        message: MessageRef,
        point: GeoPoint,
        live_period: Option<u32>,
    },
    EditLocation {
        message: MessageRef,
        point: GeoPoint,
    },
    Photo {
        message: MessageRef,
        file: FileRef,
        caption: Option<String>,
        markup: Option<Markup>,
    },
    Delete {
        message: MessageRef,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
        alert: bool,
    },
}

impl Outbound {
    /// Chat the call targeted; `None` for callback answers.
    pub fn chat(&self) -> Option<ChatId> {
        match self {
            Outbound::Text { message, .. }
            | Outbound::EditText { message, .. }
            | Outbound::EditMarkup { message, .. }
            | Outbound::Location { message, .. }
            | Outbound::EditLocation { message, .. }
            | Outbound::Photo { message, .. }
            | Outbound::Delete { message } => Some(message.chat),
            Outbound::Answer { .. } => None,
        }
    }

    /// Text or caption carried by the call.
    pub fn text(&self) -> Option<&str> {
        match self {
            Outbound::Text { text, .. } | Outbound::EditText { text, .. } => Some(text),
            Outbound::Photo { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }

    pub fn markup(&self) -> Option<&Markup> {
        match self {
            Outbound::Text { markup, .. }
            | Outbound::EditText { markup, .. }
            | Outbound::EditMarkup { markup, .. }
            | Outbound::Photo { markup, .. } => markup.as_ref(),
            _ => None,
        }
    }
}

/// A messenger that records instead of sending.
pub struct MockMessenger {
    sent: Arc<Mutex<Vec<Outbound>>>,
    next_id: AtomicI32,
    fail_live_edits: AtomicBool,
    fail_media: AtomicBool,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicI32::new(1),
            fail_live_edits: AtomicBool::new(false),
            fail_media: AtomicBool::new(false),
        }
    }

    /// Make every live-location edit fail, as after an expired live period.
    pub fn fail_live_edits(&self, fail: bool) {
        self.fail_live_edits.store(fail, Ordering::SeqCst);
    }

    /// Make photo and location sends fail while text keeps working.
    pub fn fail_media(&self, fail: bool) {
        self.fail_media.store(fail, Ordering::SeqCst);
    }

    fn media_error(&self) -> Result<(), DormbiteError> {
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(DormbiteError::channel("media upload failed"));
        }
        Ok(())
    }

    /// Every recorded call, oldest first.
    pub async fn outbound(&self) -> Vec<Outbound> {
        self.sent.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    /// Texts and captions sent or edited into `chat`, oldest first.
    pub async fn texts_to(&self, chat: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|o| o.chat() == Some(chat))
            .filter_map(|o| o.text().map(str::to_string))
            .collect()
    }

    /// Newly sent locations (not edits) in `chat`.
    pub async fn locations_to(&self, chat: ChatId) -> Vec<GeoPoint> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|o| match o {
                Outbound::Location { message, point, .. } if message.chat == chat => Some(*point),
                _ => None,
            })
            .collect()
    }

    /// Live-location sends plus edits in `chat`.
    pub async fn location_updates_to(&self, chat: ChatId) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|o| {
                matches!(o, Outbound::Location { .. } | Outbound::EditLocation { .. })
                    && o.chat() == Some(chat)
            })
            .count()
    }

    /// The most recent text message in `chat` containing `needle`.
    pub async fn message_containing(&self, chat: ChatId, needle: &str) -> Option<MessageRef> {
        self.sent.lock().await.iter().rev().find_map(|o| match o {
            Outbound::Text { message, text, .. }
                if message.chat == chat && text.contains(needle) =>
            {
                Some(*message)
            }
            _ => None,
        })
    }

    /// The newest inline token in `chat` starting with `prefix`.
    pub async fn token(&self, chat: ChatId, prefix: &str) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .filter(|o| o.chat() == Some(chat))
            .filter_map(Outbound::markup)
            .flat_map(|m| m.tokens())
            .find(|t| t.starts_with(prefix))
            .map(str::to_string)
    }

    /// Callback answers in the order they were given.
    pub async fn answers(&self) -> Vec<(Option<String>, bool)> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|o| match o {
                Outbound::Answer { text, alert, .. } => Some((text.clone(), *alert)),
                _ => None,
            })
            .collect()
    }

    fn allocate(&self, chat: ChatId) -> MessageRef {
        MessageRef {
            chat,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
        }
    }

    async fn record(&self, call: Outbound) {
        self.sent.lock().await.push(call);
    }
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockMessenger {
    fn name(&self) -> &str {
        "mock-messenger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, DormbiteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DormbiteError> {
        Ok(())
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<MessageRef, DormbiteError> {
        let message = self.allocate(chat);
        self.record(Outbound::Text {
            message,
            text: text.to_string(),
            markup,
        })
        .await;
        Ok(message)
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<(), DormbiteError> {
        self.record(Outbound::EditText {
            message,
            text: text.to_string(),
            markup,
        })
        .await;
        Ok(())
    }

    async fn edit_markup(
        &self,
        message: MessageRef,
        markup: Option<Markup>,
    ) -> Result<(), DormbiteError> {
        self.record(Outbound::EditMarkup { message, markup }).await;
        Ok(())
    }

    async fn send_location(
        &self,
        chat: ChatId,
        point: GeoPoint,
        live_period: Option<u32>,
    ) -> Result<MessageRef, DormbiteError> {
        self.media_error()?;
        let message = self.allocate(chat);
        self.record(Outbound::Location {
            message,
            point,
            live_period,
        })
        .await;
        Ok(message)
    }

    async fn edit_live_location(
        &self,
        message: MessageRef,
        point: GeoPoint,
    ) -> Result<(), DormbiteError> {
        if self.fail_live_edits.load(Ordering::SeqCst) {
            return Err(DormbiteError::channel("message can't be edited"));
        }
        self.record(Outbound::EditLocation { message, point }).await;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        file: &FileRef,
        caption: Option<&str>,
        markup: Option<Markup>,
    ) -> Result<MessageRef, DormbiteError> {
        self.media_error()?;
        let message = self.allocate(chat);
        self.record(Outbound::Photo {
            message,
            file: file.clone(),
            caption: caption.map(str::to_string),
            markup,
        })
        .await;
        Ok(message)
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), DormbiteError> {
        self.record(Outbound::Delete { message }).await;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), DormbiteError> {
        self.record(Outbound::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
            alert,
        })
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dormbite_core::types::Button;

    #[tokio::test]
    async fn message_ids_are_unique_across_chats() {
        let m = MockMessenger::new();
        let a = m.send_text(ChatId(1), "a", None).await.unwrap();
        let b = m.send_text(ChatId(2), "b", None).await.unwrap();
        assert_ne!(a.message_id, b.message_id);
        assert_eq!(m.texts_to(ChatId(1)).await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn finds_newest_token_by_prefix() {
        let m = MockMessenger::new();
        for id in [1, 2] {
            let markup = Markup::Inline(vec![vec![Button::new("Accept", format!("acc:{id}"))]]);
            m.send_text(ChatId(-5), "panel", Some(markup)).await.unwrap();
        }
        assert_eq!(m.token(ChatId(-5), "acc:").await.as_deref(), Some("acc:2"));
        assert_eq!(m.token(ChatId(9), "acc:").await, None);
    }

    #[tokio::test]
    async fn failing_media_leaves_text_working() {
        let m = MockMessenger::new();
        m.fail_media(true);
        assert!(m.send_photo(ChatId(3), &FileRef("f".into()), None, None).await.is_err());
        assert!(m.send_location(ChatId(3), GeoPoint::new(1.0, 2.0), None).await.is_err());
        assert!(m.send_text(ChatId(3), "still here", None).await.is_ok());
        assert_eq!(m.texts_to(ChatId(3)).await, vec!["still here".to_string()]);
    }

    #[tokio::test]
    async fn failing_live_edits_are_not_recorded() {
        let m = MockMessenger::new();
        let msg = m
            .send_location(ChatId(3), GeoPoint::new(1.0, 2.0), Some(60))
            .await
            .unwrap();
        m.fail_live_edits(true);
        assert!(m.edit_live_location(msg, GeoPoint::new(1.0, 2.1)).await.is_err());
        assert_eq!(m.location_updates_to(ChatId(3)).await, 1);
    }
}

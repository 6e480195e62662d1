// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of Telegram updates into platform-neutral [`InboundEvent`]s.
//!
//! Messages without a human sender (channel posts) and message types the
//! bot has no use for (stickers, voice, documents) produce `None`.

use dormbite_core::types::{
    ChatId, EventKind, FileRef, GeoPoint, InboundEvent, MessageRef, Sender, UserId,
};
use teloxide::types::{CallbackQuery, Message, User};

fn sender(user: &User) -> Sender {
    Sender {
        id: UserId(user.id.0 as i64),
        handle: user.username.clone(),
        display_name: user.full_name(),
    }
}

/// Splits `/name@bot args` into the lowercase command name and its arguments.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let body = text.strip_prefix('/')?;
    let (head, args) = match body.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (body, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.to_string()))
}

/// Event for a new or edited message. Edited messages only matter when they
/// carry a location (live-location updates arrive as edits).
pub fn message_event(msg: &Message, edited: bool) -> Option<InboundEvent> {
    let from = msg.from.as_ref()?;
    let kind = if let Some(location) = msg.location() {
        EventKind::Location {
            point: GeoPoint::new(location.latitude, location.longitude),
            live: location.live_period.is_some(),
            edited,
        }
    } else if edited {
        return None;
    } else if let Some(text) = msg.text() {
        match parse_command(text) {
            Some((name, args)) => EventKind::Command { name, args },
            None => EventKind::Text(text.to_string()),
        }
    } else if let Some(photos) = msg.photo() {
        // Telegram lists sizes smallest first.
        let largest = photos.last()?;
        EventKind::Photo {
            file: FileRef(largest.file.id.to_string()),
            reply_to: msg.reply_to_message().map(|m| m.id.0),
        }
    } else {
        return None;
    };

    Some(InboundEvent {
        chat: ChatId(msg.chat.id.0),
        sender: sender(from),
        kind,
        at: msg.date,
    })
}

/// Event for an inline button press. Presses without data are ignored.
pub fn callback_event(query: &CallbackQuery) -> Option<InboundEvent> {
    let data = query.data.clone()?;
    let message = query.message.as_ref().map(|m| MessageRef {
        chat: ChatId(m.chat().id.0),
        message_id: m.id().0,
    });
    let chat = message
        .map(|m| m.chat)
        .unwrap_or(ChatId(query.from.id.0 as i64));

    Some(InboundEvent {
        chat,
        sender: sender(&query.from),
        kind: EventKind::Callback {
            id: query.id.to_string(),
            data,
            message,
        },
        at: chrono::Utc::now(),
    })
}

// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of [`Markup`] into Bot API reply markup.

use dormbite_core::types::{Button, KeyButton, Markup};
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
    KeyboardRemove, ReplyMarkup,
};

fn inline_button(button: &Button) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(button.label.clone(), button.token.clone())
}

fn key_button(button: &KeyButton) -> KeyboardButton {
    let key = KeyboardButton::new(button.text.clone());
    if button.request_location {
        key.request(ButtonRequest::Location)
    } else {
        key
    }
}

/// Inline keyboard for `rows`.
pub fn inline_keyboard(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| row.iter().map(inline_button)))
}

/// Markup for a newly sent message.
pub fn reply_markup(markup: &Markup) -> ReplyMarkup {
    match markup {
        Markup::Inline(rows) => ReplyMarkup::InlineKeyboard(inline_keyboard(rows)),
        Markup::Keyboard(rows) => ReplyMarkup::Keyboard(KeyboardMarkup::new(
            rows.iter().map(|row| row.iter().map(key_button)),
        )),
        Markup::RemoveKeyboard => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

/// Markup for an edit. The Bot API only lets edits carry inline buttons,
/// so anything else yields `None` and the edit drops the buttons.
pub fn edit_markup(markup: Option<&Markup>) -> Option<InlineKeyboardMarkup> {
    match markup {
        Some(Markup::Inline(rows)) => Some(inline_keyboard(rows)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn inline_rows_keep_tokens_and_order() {
        let markup = Markup::Inline(vec![
            vec![Button::new("✅ Accept", "acc:4"), Button::new("❌ Cancel", "acx:4")],
            vec![Button::new("📍 Location", "loc:4")],
        ]);
        let ReplyMarkup::InlineKeyboard(kb) = reply_markup(&markup) else {
            panic!("expected inline keyboard");
        };
        assert_eq!(kb.inline_keyboard.len(), 2);
        assert_eq!(kb.inline_keyboard[0][1].text, "❌ Cancel");
        match &kb.inline_keyboard[1][0].kind {
            InlineKeyboardButtonKind::CallbackData(data) => assert_eq!(data, "loc:4"),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn location_key_requests_location() {
        let markup = Markup::Keyboard(vec![vec![
            KeyButton::location("📍 Share location"),
            KeyButton::text("Cancel"),
        ]]);
        let ReplyMarkup::Keyboard(kb) = reply_markup(&markup) else {
            panic!("expected reply keyboard");
        };
        assert_eq!(kb.keyboard[0][0].request, Some(ButtonRequest::Location));
        assert_eq!(kb.keyboard[0][1].request, None);
    }

    #[test]
    fn edits_only_carry_inline_buttons() {
        assert!(edit_markup(None).is_none());
        assert!(edit_markup(Some(&Markup::RemoveKeyboard)).is_none());
        let inline = Markup::Inline(vec![vec![Button::new("Pay", "pay:1")]]);
        assert_eq!(edit_markup(Some(&inline)).unwrap().inline_keyboard.len(), 1);
    }
}

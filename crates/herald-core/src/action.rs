//! Outbound actions produced by handlers and middlewares.

use serde::{Deserialize, Serialize};

use crate::event::{ChatId, Event, MessageId};

/// A single side effect the dispatch core asks the transport to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Action {
    /// Send a text message, optionally as a reply.
    SendText {
        chat_id: ChatId,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<MessageId>,
    },
    /// Delete a message.
    DeleteMessage {
        chat_id: ChatId,
        message_id: MessageId,
    },
    /// Answer a callback query, either as a toast or as a modal alert.
    AnswerCallback {
        callback_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default)]
        show_alert: bool,
    },
    /// Accept or decline a pre-checkout query.
    AnswerPreCheckout {
        query_id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

impl Action {
    pub fn send_text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self::SendText {
            chat_id,
            text: text.into(),
            reply_to: None,
        }
    }

    pub fn delete_message(chat_id: ChatId, message_id: MessageId) -> Self {
        Self::DeleteMessage {
            chat_id,
            message_id,
        }
    }

    pub fn answer_callback(callback_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::AnswerCallback {
            callback_id: callback_id.into(),
            text: Some(text.into()),
            show_alert: false,
        }
    }

    pub fn alert_callback(callback_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::AnswerCallback {
            callback_id: callback_id.into(),
            text: Some(text.into()),
            show_alert: true,
        }
    }

    /// Method name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendText { .. } => "send_text",
            Self::DeleteMessage { .. } => "delete_message",
            Self::AnswerCallback { .. } => "answer_callback",
            Self::AnswerPreCheckout { .. } => "answer_pre_checkout",
        }
    }
}

impl Event {
    /// Answers the event in place.
    ///
    /// Messages get a new message in the same chat, callback queries a
    /// non-alert answer. Pre-checkout queries cannot be answered with text.
    pub fn answer(&self, text: impl Into<String>) -> Option<Action> {
        match self {
            Event::CallbackQuery(q) => Some(Action::answer_callback(q.id.clone(), text)),
            Event::PreCheckoutQuery(_) => None,
            _ => self
                .chat()
                .map(|chat| Action::send_text(chat.id, text.into())),
        }
    }

    /// Replies to a message-category event, quoting it.
    pub fn reply(&self, text: impl Into<String>) -> Option<Action> {
        if !matches!(self, Event::Text(_) | Event::Media(_) | Event::Service(_)) {
            return None;
        }
        self.message().map(|meta| Action::SendText {
            chat_id: meta.chat.id,
            text: text.into(),
            reply_to: Some(meta.message_id),
        })
    }

    /// Deletes the message this event carries.
    pub fn delete(&self) -> Option<Action> {
        match self {
            Event::Text(_) | Event::Media(_) | Event::Service(_) => self
                .message()
                .map(|meta| Action::delete_message(meta.chat.id, meta.message_id)),
            _ => None,
        }
    }

    /// Answers a callback query with a modal alert.
    pub fn alert(&self, text: impl Into<String>) -> Option<Action> {
        match self {
            Event::CallbackQuery(q) => Some(Action::alert_callback(q.id.clone(), text)),
            _ => None,
        }
    }

    /// Accepts a pre-checkout query.
    pub fn approve_checkout(&self) -> Option<Action> {
        match self {
            Event::PreCheckoutQuery(q) => Some(Action::AnswerPreCheckout {
                query_id: q.id.clone(),
                ok: true,
                error_message: None,
            }),
            _ => None,
        }
    }
}

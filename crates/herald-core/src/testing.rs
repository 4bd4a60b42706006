//! Test doubles: a recording transport and event fixtures.
//!
//! Enabled with the `testing` feature so downstream crates can use them from
//! their own test modules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::action::Action;
use crate::error::{TransportError, TransportResult};
use crate::event::{
    CallbackQuery, Chat, ChatId, ChatKind, EntityKind, Event, MediaKind, MediaMessage,
    MessageEntity, MessageId, MessageMeta, PreCheckoutQuery, ServiceAction, ServiceMessage,
    TextMessage, User, UserId,
};
use crate::member::ChatMember;
use crate::transport::Transport;

/// A [`Transport`] that records every action instead of sending it.
#[derive(Default)]
pub struct RecordingTransport {
    actions: Mutex<Vec<Action>>,
    members: Mutex<HashMap<(ChatId, UserId), ChatMember>>,
    member_lookups: AtomicUsize,
    fail_actions: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a membership record returned by `get_chat_member`.
    pub fn with_member(self, chat_id: ChatId, member: ChatMember) -> Self {
        self.members.lock().insert((chat_id, member.user_id), member);
        self
    }

    /// Makes every outbound action fail with [`TransportError::Rejected`].
    pub fn fail_actions(&self, fail: bool) {
        self.fail_actions.store(fail, Ordering::SeqCst);
    }

    /// Actions performed so far, in order.
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    /// Number of `get_chat_member` calls made so far.
    pub fn member_lookups(&self) -> usize {
        self.member_lookups.load(Ordering::SeqCst)
    }

    fn record(&self, method: &'static str, action: Action) -> TransportResult<()> {
        if self.fail_actions.load(Ordering::SeqCst) {
            return Err(TransportError::rejected(method, "rejected by test"));
        }
        self.actions.lock().push(action);
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> TransportResult<()> {
        self.record(
            "send_text",
            Action::SendText {
                chat_id,
                text: text.to_string(),
                reply_to,
            },
        )
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> TransportResult<()> {
        self.record(
            "delete_message",
            Action::delete_message(chat_id, message_id),
        )
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> TransportResult<()> {
        self.record(
            "answer_callback",
            Action::AnswerCallback {
                callback_id: callback_id.to_string(),
                text: text.map(str::to_string),
                show_alert,
            },
        )
    }

    async fn answer_pre_checkout(
        &self,
        query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> TransportResult<()> {
        self.record(
            "answer_pre_checkout",
            Action::AnswerPreCheckout {
                query_id: query_id.to_string(),
                ok,
                error_message: error_message.map(str::to_string),
            },
        )
    }

    async fn get_chat_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> TransportResult<ChatMember> {
        self.member_lookups.fetch_add(1, Ordering::SeqCst);
        self.members
            .lock()
            .get(&(chat_id, user_id))
            .cloned()
            .ok_or(TransportError::MemberNotFound { chat_id, user_id })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

static NEXT_MESSAGE_ID: AtomicI64 = AtomicI64::new(1);

fn fixed_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn meta(chat: Chat, from: Option<User>) -> MessageMeta {
    MessageMeta {
        message_id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
        chat,
        from,
        date: fixed_date(),
    }
}

pub fn user(id: UserId) -> User {
    User::new(id, format!("user{id}"))
}

pub fn private(id: ChatId) -> Chat {
    Chat::new(id, ChatKind::Private)
}

pub fn group(id: ChatId) -> Chat {
    Chat::new(id, ChatKind::Group)
}

pub fn supergroup(id: ChatId) -> Chat {
    Chat::new(id, ChatKind::Supergroup)
}

/// A text message without entities.
pub fn text(chat: Chat, from: Option<User>, text: &str) -> Event {
    text_with_entities(chat, from, text, Vec::new())
}

/// A text message with explicit entities.
pub fn text_with_entities(
    chat: Chat,
    from: Option<User>,
    text: &str,
    entities: Vec<MessageEntity>,
) -> Event {
    Event::Text(TextMessage {
        meta: meta(chat, from),
        text: text.to_string(),
        entities,
    })
}

/// A private text message from `from`, in the chat whose id equals the user id.
pub fn private_text(from: User, body: &str) -> Event {
    text(private(from.id), Some(from), body)
}

/// A command message with a `bot_command` entity covering the command word.
pub fn command(chat: Chat, from: User, body: &str) -> Event {
    let word = body.split_whitespace().next().unwrap_or(body);
    let entity = MessageEntity::new(EntityKind::BotCommand, 0, word.encode_utf16().count());
    text_with_entities(chat, Some(from), body, vec![entity])
}

pub fn media(chat: Chat, from: User, kind: MediaKind) -> Event {
    Event::Media(MediaMessage {
        meta: meta(chat, Some(from)),
        media: kind,
        file_id: "file".to_string(),
        caption: None,
        caption_entities: Vec::new(),
    })
}

pub fn service(chat: Chat, from: Option<User>, action: ServiceAction) -> Event {
    Event::Service(ServiceMessage {
        meta: meta(chat, from),
        action,
    })
}

/// A callback query; `chat` is the chat of the message the button belongs to.
pub fn callback(from: User, chat: Option<Chat>, data: &str) -> Event {
    let id = NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed);
    Event::CallbackQuery(CallbackQuery {
        id: format!("cb-{id}"),
        message: chat.map(|c| meta(c, None)),
        from,
        data: Some(data.to_string()),
    })
}

pub fn pre_checkout(from: User, total_amount: i64) -> Event {
    Event::PreCheckoutQuery(PreCheckoutQuery {
        id: "checkout-1".to_string(),
        from,
        currency: "USD".to_string(),
        total_amount,
        invoice_payload: "payload".to_string(),
    })
}

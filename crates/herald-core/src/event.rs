//! Inbound event model.
//!
//! Every update a chat platform can deliver is represented by one variant of
//! the closed [`Event`] enum. Transports decode their wire format into these
//! types (they derive `serde::Deserialize` with a snake_case `type` tag), and
//! everything downstream (filters, middlewares, handlers) works on them.
//!
//! ```text
//! Event
//! ├── Text(TextMessage)            ─┐
//! ├── Media(MediaMessage)           ├─ EventCategory::Message
//! ├── Service(ServiceMessage)      ─┘
//! ├── CallbackQuery(CallbackQuery)  ── EventCategory::CallbackQuery
//! └── PreCheckoutQuery(..)          ── EventCategory::PreCheckoutQuery
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform chat identifier.
pub type ChatId = i64;
/// Platform user identifier.
pub type UserId = i64;
/// Message identifier, unique within a chat.
pub type MessageId = i64;

// ============================================================================
// Chats and users
// ============================================================================

/// The kind of chat an event happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Supergroup => "supergroup",
            Self::Channel => "channel",
        }
    }

    /// Returns `true` for basic groups and supergroups.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat (private conversation, group, supergroup or channel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Chat {
    pub fn new(id: ChatId, kind: ChatKind) -> Self {
        Self {
            id,
            kind,
            title: None,
        }
    }
}

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// IETF language tag reported by the user's client, e.g. `en` or `pt-BR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

impl User {
    pub fn new(id: UserId, first_name: impl Into<String>) -> Self {
        Self {
            id,
            is_bot: false,
            first_name: first_name.into(),
            last_name: None,
            username: None,
            language_code: None,
        }
    }

    /// First and last name joined with a space.
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

// ============================================================================
// Message entities
// ============================================================================

/// The kind of a formatted span inside a message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Mention,
    TextMention,
    Hashtag,
    Cashtag,
    BotCommand,
    Url,
    Email,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Pre,
    TextLink,
    #[serde(other)]
    Other,
}

/// A formatted span inside a message text.
///
/// `offset` and `length` are measured in UTF-16 code units, as chat platforms
/// report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
}

impl MessageEntity {
    pub fn new(kind: EntityKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
        }
    }

    /// Returns the part of `text` covered by this entity.
    ///
    /// Returns `None` when the span lies outside the text or splits a
    /// surrogate pair.
    pub fn extract_from(&self, text: &str) -> Option<String> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let end = self.offset.checked_add(self.length)?;
        let span = units.get(self.offset..end)?;
        String::from_utf16(span).ok()
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Fields shared by every message-shaped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMeta {
    pub message_id: MessageId,
    pub chat: Chat,
    /// Sender; absent for channel posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
}

/// A plain text message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    #[serde(flatten)]
    pub meta: MessageMeta,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
}

/// The kind of attachment carried by a [`MediaMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Voice,
    Document,
    Sticker,
    Animation,
}

/// A message carrying an attachment and an optional caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMessage {
    #[serde(flatten)]
    pub meta: MessageMeta,
    pub media: MediaKind,
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption_entities: Vec<MessageEntity>,
}

/// What a service message reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceAction {
    MembersJoined { members: Vec<User> },
    MemberLeft { member: User },
    TitleChanged { title: String },
    MessagePinned { message_id: MessageId },
}

/// A service message generated by the platform (joins, leaves, pins, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMessage {
    #[serde(flatten)]
    pub meta: MessageMeta,
    pub action: ServiceAction,
}

/// Content type of a message-category event, used by content filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Photo,
    Video,
    Audio,
    Voice,
    Document,
    Sticker,
    Animation,
    NewChatMembers,
    LeftChatMember,
    NewChatTitle,
    PinnedMessage,
}

impl From<MediaKind> for ContentKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Photo => Self::Photo,
            MediaKind::Video => Self::Video,
            MediaKind::Audio => Self::Audio,
            MediaKind::Voice => Self::Voice,
            MediaKind::Document => Self::Document,
            MediaKind::Sticker => Self::Sticker,
            MediaKind::Animation => Self::Animation,
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// A press on an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// The message the button was attached to, when still available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Final confirmation request sent before a payment is charged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreCheckoutQuery {
    pub id: String,
    pub from: User,
    pub currency: String,
    /// Amount in the smallest currency unit.
    pub total_amount: i64,
    pub invoice_payload: String,
}

// ============================================================================
// Event
// ============================================================================

/// Dispatch category. Middlewares and routes are registered per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Message,
    CallbackQuery,
    PreCheckoutQuery,
}

impl EventCategory {
    pub const ALL: [EventCategory; 3] = [
        EventCategory::Message,
        EventCategory::CallbackQuery,
        EventCategory::PreCheckoutQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::CallbackQuery => "callback_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound platform update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Text(TextMessage),
    Media(MediaMessage),
    Service(ServiceMessage),
    CallbackQuery(CallbackQuery),
    PreCheckoutQuery(PreCheckoutQuery),
}

impl Event {
    /// Short name used in logs and spans.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text_message",
            Self::Media(_) => "media_message",
            Self::Service(_) => "service_message",
            Self::CallbackQuery(_) => "callback_query",
            Self::PreCheckoutQuery(_) => "pre_checkout_query",
        }
    }

    pub fn category(&self) -> EventCategory {
        match self {
            Self::Text(_) | Self::Media(_) | Self::Service(_) => EventCategory::Message,
            Self::CallbackQuery(_) => EventCategory::CallbackQuery,
            Self::PreCheckoutQuery(_) => EventCategory::PreCheckoutQuery,
        }
    }

    /// Message metadata. For callback queries this is the message the
    /// pressed button belongs to.
    pub fn message(&self) -> Option<&MessageMeta> {
        match self {
            Self::Text(m) => Some(&m.meta),
            Self::Media(m) => Some(&m.meta),
            Self::Service(m) => Some(&m.meta),
            Self::CallbackQuery(q) => q.message.as_ref(),
            Self::PreCheckoutQuery(_) => None,
        }
    }

    /// The chat the event belongs to, if any.
    pub fn chat(&self) -> Option<&Chat> {
        self.message().map(|meta| &meta.chat)
    }

    /// The user who caused the event, if known.
    pub fn sender(&self) -> Option<&User> {
        match self {
            Self::Text(m) => m.meta.from.as_ref(),
            Self::Media(m) => m.meta.from.as_ref(),
            Self::Service(m) => m.meta.from.as_ref(),
            Self::CallbackQuery(q) => Some(&q.from),
            Self::PreCheckoutQuery(q) => Some(&q.from),
        }
    }

    /// Message text, or the caption for media messages.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(m) => Some(&m.text),
            Self::Media(m) => m.caption.as_deref(),
            _ => None,
        }
    }

    /// Entities belonging to [`Event::text`].
    pub fn entities(&self) -> &[MessageEntity] {
        match self {
            Self::Text(m) => &m.entities,
            Self::Media(m) => &m.caption_entities,
            _ => &[],
        }
    }

    /// Content kind of message-category events.
    pub fn content_kind(&self) -> Option<ContentKind> {
        match self {
            Self::Text(_) => Some(ContentKind::Text),
            Self::Media(m) => Some(m.media.into()),
            Self::Service(m) => Some(match m.action {
                ServiceAction::MembersJoined { .. } => ContentKind::NewChatMembers,
                ServiceAction::MemberLeft { .. } => ContentKind::LeftChatMember,
                ServiceAction::TitleChanged { .. } => ContentKind::NewChatTitle,
                ServiceAction::MessagePinned { .. } => ContentKind::PinnedMessage,
            }),
            _ => None,
        }
    }

    /// Callback data of a callback query.
    pub fn callback_data(&self) -> Option<&str> {
        match self {
            Self::CallbackQuery(q) => q.data.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_offsets_are_utf16() {
        // The emoji takes two UTF-16 code units.
        let text = "😀 hi @alice";
        let entity = MessageEntity::new(EntityKind::Mention, 6, 6);
        assert_eq!(entity.extract_from(text).as_deref(), Some("@alice"));
    }

    #[test]
    fn test_entity_out_of_range() {
        let entity = MessageEntity::new(EntityKind::Mention, 3, 10);
        assert_eq!(entity.extract_from("short"), None);
    }

    #[test]
    fn test_decode_text_message() {
        let raw = json!({
            "type": "text",
            "message_id": 7,
            "chat": { "id": -100, "kind": "supergroup" },
            "from": { "id": 42, "first_name": "Ann", "language_code": "ru" },
            "date": "2024-05-04T10:00:00Z",
            "text": "/start",
            "entities": [{ "type": "bot_command", "offset": 0, "length": 6 }]
        });

        let event: Event = serde_json::from_value(raw).unwrap();
        assert_eq!(event.category(), EventCategory::Message);
        assert_eq!(event.chat().map(|c| c.kind), Some(ChatKind::Supergroup));
        assert_eq!(event.sender().map(|u| u.id), Some(42));
        assert_eq!(event.text(), Some("/start"));
        assert_eq!(event.entities()[0].kind, EntityKind::BotCommand);
        assert_eq!(event.content_kind(), Some(ContentKind::Text));
    }

    #[test]
    fn test_decode_service_message() {
        let raw = json!({
            "type": "service",
            "message_id": 8,
            "chat": { "id": -5, "kind": "group" },
            "action": { "kind": "member_left", "member": { "id": 3, "first_name": "Bo" } }
        });

        let event: Event = serde_json::from_value(raw).unwrap();
        assert_eq!(event.name(), "service_message");
        assert_eq!(event.content_kind(), Some(ContentKind::LeftChatMember));
        assert!(event.sender().is_none());
    }

    #[test]
    fn test_callback_without_message_has_no_chat() {
        let raw = json!({
            "type": "callback_query",
            "id": "cb-1",
            "from": { "id": 9, "first_name": "Cy" },
            "data": "page:2"
        });

        let event: Event = serde_json::from_value(raw).unwrap();
        assert_eq!(event.category(), EventCategory::CallbackQuery);
        assert!(event.chat().is_none());
        assert_eq!(event.sender().map(|u| u.id), Some(9));
        assert_eq!(event.callback_data(), Some("page:2"));
        assert_eq!(event.content_kind(), None);
    }
}

//! # Herald Core
//!
//! The platform-facing foundation of the Herald bot framework.
//!
//! This crate provides:
//! - The closed [`Event`] model delivered by a chat platform (messages, service
//!   messages, callback queries, pre-checkout queries)
//! - The outbound [`Action`]s a handler may produce
//! - The [`Transport`] contract the dispatch core talks to
//! - Chat membership data used by permission filters
//!
//! Nothing here knows about routing or middleware; those live in
//! `herald-framework`.

pub mod action;
pub mod error;
pub mod event;
pub mod member;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use action::Action;
pub use error::{TransportError, TransportResult};
pub use event::{
    CallbackQuery, Chat, ChatId, ChatKind, ContentKind, EntityKind, Event, EventCategory,
    MediaKind, MediaMessage, MessageEntity, MessageId, MessageMeta, PreCheckoutQuery,
    ServiceAction, ServiceMessage, TextMessage, User, UserId,
};
pub use member::{ChatMember, MemberStatus};
pub use transport::{BoxedTransport, Transport};

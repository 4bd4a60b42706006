//! The transport contract.
//!
//! A [`Transport`] is the narrow interface between the dispatch core and a
//! chat platform. Polling or webhook plumbing lives entirely on the
//! transport's side; the core only needs to send replies, delete messages,
//! answer queries and look up membership.
//!
//! ```rust,ignore
//! use herald_core::{Action, Transport};
//!
//! async fn greet(transport: &dyn Transport, chat_id: i64) {
//!     let action = Action::send_text(chat_id, "Hello!");
//!     if let Err(e) = transport.execute(&action).await {
//!         tracing::warn!("Failed to greet: {e}");
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::action::Action;
use crate::error::TransportResult;
use crate::event::{ChatId, MessageId, UserId};
use crate::member::ChatMember;

/// Outbound side of a chat platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a text message.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> TransportResult<()>;

    /// Deletes a message.
    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId)
    -> TransportResult<()>;

    /// Answers a callback query.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> TransportResult<()>;

    /// Answers a pre-checkout query.
    async fn answer_pre_checkout(
        &self,
        query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> TransportResult<()>;

    /// Looks up a user's membership in a chat.
    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId)
    -> TransportResult<ChatMember>;

    /// Performs a single [`Action`].
    async fn execute(&self, action: &Action) -> TransportResult<()> {
        trace!(action = action.name(), "Executing action");
        match action {
            Action::SendText {
                chat_id,
                text,
                reply_to,
            } => self.send_text(*chat_id, text, *reply_to).await,
            Action::DeleteMessage {
                chat_id,
                message_id,
            } => self.delete_message(*chat_id, *message_id).await,
            Action::AnswerCallback {
                callback_id,
                text,
                show_alert,
            } => {
                self.answer_callback(callback_id, text.as_deref(), *show_alert)
                    .await
            }
            Action::AnswerPreCheckout {
                query_id,
                ok,
                error_message,
            } => {
                self.answer_pre_checkout(query_id, *ok, error_message.as_deref())
                    .await
            }
        }
    }
}

/// A shared, type-erased transport.
pub type BoxedTransport = Arc<dyn Transport>;

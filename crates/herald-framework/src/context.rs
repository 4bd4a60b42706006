//! Request-scoped state for one dispatch cycle.
//!
//! This module provides two types that together model how an event travels
//! through the pipeline:
//!
//! - [`RequestContext`] — a string-keyed map of arbitrary values. A fresh one
//!   is created for every inbound event (optionally pre-seeded with shared
//!   values), written by middlewares and filters, read by handlers and
//!   discarded when the dispatch completes.
//!
//! - [`DispatchRequest`] — the value threaded through every middleware and
//!   into the handler. It pairs the event with the transport, the context and
//!   a per-dispatch membership cache.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::warn;

use crate::error::{ExtractError, ExtractResult};
use herald_core::{BoxedTransport, ChatMember, Event};

/// A type-erased value stored in a [`RequestContext`].
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Key under which the localization middleware stores the [`L10n`](crate::L10n) handle.
pub const L10N_KEY: &str = "l10n";

/// Key under which [`HasUsernamesFilter`](crate::filter::HasUsernamesFilter) stores mentions.
pub const USERNAMES_KEY: &str = "usernames";

/// Key under which [`CommandFilter`](crate::filter::CommandFilter) stores the parsed command.
pub const COMMAND_KEY: &str = "command";

// =============================================================================
// RequestContext
// =============================================================================

/// Mutable key/value map scoped to one dispatch.
///
/// Values written by an earlier middleware are visible to every later
/// middleware and to the handler.
#[derive(Clone, Default)]
pub struct RequestContext {
    values: HashMap<String, ContextValue>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    /// Stores an already type-erased value.
    pub fn insert_value(&mut self, key: impl Into<String>, value: ContextValue) {
        self.values.insert(key.into(), value);
    }

    /// Merges `fields` into the context, later entries winning.
    pub fn extend(&mut self, fields: impl IntoIterator<Item = (String, ContextValue)>) {
        self.values.extend(fields);
    }

    /// Returns the value under `key` if it has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.as_ref().downcast_ref::<T>())
    }

    /// Like [`get`](Self::get), but tells a missing key from a type mismatch.
    pub fn try_get<T: Any>(&self, key: &str) -> ExtractResult<&T> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ExtractError::missing(key))?;
        value
            .as_ref()
            .downcast_ref::<T>()
            .ok_or_else(|| ExtractError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Returns a clone of the value under `key`.
    pub fn get_cloned<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.get::<T>(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("RequestContext")
            .field("keys", &keys)
            .finish()
    }
}

// =============================================================================
// DispatchRequest
// =============================================================================

/// The request value passed through the middleware chain into the handler.
pub struct DispatchRequest {
    event: Arc<Event>,
    transport: BoxedTransport,
    context: RequestContext,
    /// Memoized membership of the sender in the event's chat.
    member: Arc<OnceCell<Option<ChatMember>>>,
}

impl DispatchRequest {
    pub fn new(event: Arc<Event>, transport: BoxedTransport) -> Self {
        Self::with_context(event, transport, RequestContext::new())
    }

    pub fn with_context(
        event: Arc<Event>,
        transport: BoxedTransport,
        context: RequestContext,
    ) -> Self {
        Self {
            event,
            transport,
            context,
            member: Arc::new(OnceCell::new()),
        }
    }

    pub fn event(&self) -> &Arc<Event> {
        &self.event
    }

    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.context
    }

    /// Membership of the event's sender in the event's chat.
    ///
    /// The transport is asked at most once per dispatch; later calls reuse
    /// the first answer. Lookup failures are logged and yield `None`, as do
    /// events without a chat or sender.
    pub async fn chat_member(&self) -> Option<&ChatMember> {
        let (chat_id, user_id) = match (self.event.chat(), self.event.sender()) {
            (Some(chat), Some(user)) => (chat.id, user.id),
            _ => return None,
        };

        self.member
            .get_or_init(|| async {
                match self.transport.get_chat_member(chat_id, user_id).await {
                    Ok(member) => Some(member),
                    Err(e) => {
                        warn!(chat_id, user_id, error = %e, "Chat member lookup failed");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }
}

impl std::fmt::Debug for DispatchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRequest")
            .field("event", &self.event.name())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

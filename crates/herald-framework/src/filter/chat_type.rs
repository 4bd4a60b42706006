use async_trait::async_trait;

use super::{Filter, Verdict};
use crate::context::DispatchRequest;
use herald_core::ChatKind;

/// Matches events whose chat kind is one of the allowed kinds.
///
/// Events without a chat (callback queries on vanished messages,
/// pre-checkout queries) never match.
#[derive(Debug, Clone)]
pub struct ChatTypeFilter {
    kinds: Vec<ChatKind>,
}

impl ChatTypeFilter {
    pub fn new(kinds: impl IntoIterator<Item = ChatKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn private() -> Self {
        Self::new([ChatKind::Private])
    }

    /// Basic groups and supergroups.
    pub fn groups() -> Self {
        Self::new([ChatKind::Group, ChatKind::Supergroup])
    }
}

#[async_trait]
impl Filter for ChatTypeFilter {
    async fn check(&self, request: &DispatchRequest) -> Verdict {
        request
            .event()
            .chat()
            .is_some_and(|chat| self.kinds.contains(&chat.kind))
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::testing::{RecordingTransport, callback, group, private_text, text, user};
    use std::sync::Arc;

    async fn check(filter: &ChatTypeFilter, event: herald_core::Event) -> bool {
        let request = DispatchRequest::new(Arc::new(event), Arc::new(RecordingTransport::new()));
        filter.check(&request).await.is_match()
    }

    #[tokio::test]
    async fn test_private_only() {
        let filter = ChatTypeFilter::private();
        assert!(check(&filter, private_text(user(1), "hi")).await);
        assert!(!check(&filter, text(group(-1), Some(user(1)), "hi")).await);
    }

    #[tokio::test]
    async fn test_callback_without_message_never_matches() {
        let filter = ChatTypeFilter::new([
            ChatKind::Private,
            ChatKind::Group,
            ChatKind::Supergroup,
            ChatKind::Channel,
        ]);
        assert!(!check(&filter, callback(user(1), None, "x")).await);
        assert!(check(&filter, callback(user(1), Some(group(-3)), "x")).await);
    }
}

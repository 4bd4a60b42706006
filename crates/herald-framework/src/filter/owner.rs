use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Filter, Verdict};
use crate::context::DispatchRequest;
use herald_core::UserId;

/// Matches when the sender's ownership equals `is_owner`.
///
/// Events without a sender never match, whatever `is_owner` says.
#[derive(Debug, Clone)]
pub struct IsOwnerFilter {
    owners: Arc<HashSet<UserId>>,
    is_owner: bool,
}

impl IsOwnerFilter {
    pub fn new(owners: impl IntoIterator<Item = UserId>, is_owner: bool) -> Self {
        Self {
            owners: Arc::new(owners.into_iter().collect()),
            is_owner,
        }
    }

    /// Matches owners only.
    pub fn owners(owners: impl IntoIterator<Item = UserId>) -> Self {
        Self::new(owners, true)
    }
}

#[async_trait]
impl Filter for IsOwnerFilter {
    async fn check(&self, request: &DispatchRequest) -> Verdict {
        match request.event().sender() {
            Some(user) => (self.owners.contains(&user.id) == self.is_owner).into(),
            None => Verdict::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::Event;
    use herald_core::testing::{RecordingTransport, group, private_text, text, user};

    async fn check(filter: &IsOwnerFilter, event: Event) -> bool {
        let request = DispatchRequest::new(Arc::new(event), Arc::new(RecordingTransport::new()));
        filter.check(&request).await.is_match()
    }

    #[tokio::test]
    async fn test_owner_flag() {
        let owners = IsOwnerFilter::new([10, 11], true);
        let strangers = IsOwnerFilter::new([10, 11], false);

        assert!(check(&owners, private_text(user(10), "x")).await);
        assert!(!check(&owners, private_text(user(12), "x")).await);
        assert!(check(&strangers, private_text(user(12), "x")).await);
        assert!(!check(&strangers, private_text(user(11), "x")).await);
    }

    #[tokio::test]
    async fn test_missing_sender_never_matches() {
        let strangers = IsOwnerFilter::new([10], false);
        assert!(!check(&strangers, text(group(-1), None, "channel post")).await);
    }
}

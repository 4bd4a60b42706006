//! Permission filters backed by a chat membership lookup.
//!
//! Both filters ask the transport through
//! [`DispatchRequest::chat_member`], which memoizes the lookup for the rest
//! of the dispatch. A failed lookup counts as "does not match".

use async_trait::async_trait;

use super::{Filter, Verdict};
use crate::context::DispatchRequest;

/// Matches when the sender's admin status equals `is_admin`.
///
/// Creators count as admins.
#[derive(Debug, Clone, Copy)]
pub struct IsAdminFilter {
    is_admin: bool,
}

impl IsAdminFilter {
    pub fn new(is_admin: bool) -> Self {
        Self { is_admin }
    }
}

#[async_trait]
impl Filter for IsAdminFilter {
    async fn check(&self, request: &DispatchRequest) -> Verdict {
        match request.chat_member().await {
            Some(member) => (member.is_admin() == self.is_admin).into(),
            None => Verdict::Reject,
        }
    }
}

/// Matches when the sender's ability to restrict members equals `can_restrict`.
///
/// Platforms report `can_restrict_members = false` for chat creators, so the
/// creator status is checked as well.
#[derive(Debug, Clone, Copy)]
pub struct MemberCanRestrictFilter {
    can_restrict: bool,
}

impl MemberCanRestrictFilter {
    pub fn new(can_restrict: bool) -> Self {
        Self { can_restrict }
    }
}

#[async_trait]
impl Filter for MemberCanRestrictFilter {
    async fn check(&self, request: &DispatchRequest) -> Verdict {
        match request.chat_member().await {
            Some(member) => {
                let able = member.is_creator() || member.can_restrict_members;
                (able == self.can_restrict).into()
            }
            None => Verdict::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::testing::{RecordingTransport, group, text, user};
    use herald_core::{ChatMember, MemberStatus};
    use std::sync::Arc;

    fn request(transport: RecordingTransport, user_id: i64) -> DispatchRequest {
        DispatchRequest::new(
            Arc::new(text(group(-50), Some(user(user_id)), "!ban")),
            Arc::new(transport),
        )
    }

    #[tokio::test]
    async fn test_creator_can_always_restrict() {
        let transport = RecordingTransport::new().with_member(
            -50,
            ChatMember::new(1, MemberStatus::Creator).with_restrict(false),
        );
        let req = request(transport, 1);

        assert!(MemberCanRestrictFilter::new(true).check(&req).await.is_match());
        assert!(!MemberCanRestrictFilter::new(false).check(&req).await.is_match());
    }

    #[tokio::test]
    async fn test_admin_without_restrict_right() {
        let transport = RecordingTransport::new().with_member(
            -50,
            ChatMember::new(2, MemberStatus::Administrator).with_restrict(false),
        );
        let req = request(transport, 2);

        assert!(IsAdminFilter::new(true).check(&req).await.is_match());
        assert!(MemberCanRestrictFilter::new(false).check(&req).await.is_match());
    }

    #[tokio::test]
    async fn test_lookup_failure_never_matches() {
        let req = request(RecordingTransport::new(), 3);

        assert!(!IsAdminFilter::new(true).check(&req).await.is_match());
        assert!(!IsAdminFilter::new(false).check(&req).await.is_match());
    }

    #[tokio::test]
    async fn test_filters_share_one_lookup() {
        let transport = Arc::new(
            RecordingTransport::new()
                .with_member(-50, ChatMember::new(4, MemberStatus::Member)),
        );
        let req = DispatchRequest::new(
            Arc::new(text(group(-50), Some(user(4)), "hi")),
            transport.clone(),
        );

        assert!(IsAdminFilter::new(false).check(&req).await.is_match());
        assert!(MemberCanRestrictFilter::new(false).check(&req).await.is_match());
        assert_eq!(transport.member_lookups(), 1);
    }
}

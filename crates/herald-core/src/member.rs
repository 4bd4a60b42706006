//! Chat membership, as reported by the platform.

use serde::{Deserialize, Serialize};

use crate::event::UserId;

/// A user's status in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

/// Membership record returned by [`Transport::get_chat_member`](crate::Transport::get_chat_member).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMember {
    pub user_id: UserId,
    pub status: MemberStatus,
    /// Administrator right to restrict, ban or unban members.
    ///
    /// Platforms report `false` for chat creators even though creators hold
    /// every right.
    #[serde(default)]
    pub can_restrict_members: bool,
}

impl ChatMember {
    pub fn new(user_id: UserId, status: MemberStatus) -> Self {
        Self {
            user_id,
            status,
            can_restrict_members: false,
        }
    }

    pub fn with_restrict(mut self, can_restrict_members: bool) -> Self {
        self.can_restrict_members = can_restrict_members;
        self
    }

    pub fn is_creator(&self) -> bool {
        self.status == MemberStatus::Creator
    }

    /// Creators and administrators.
    pub fn is_admin(&self) -> bool {
        matches!(
            self.status,
            MemberStatus::Creator | MemberStatus::Administrator
        )
    }
}

//! Chat membership status and join detection.

use serde::{Deserialize, Serialize};

/// Status of a user in a chat, as reported by the messaging platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    #[serde(alias = "creator")]
    Owner,
    Administrator,
    Member,
    /// Muted or otherwise limited; may or may not still be in the chat.
    Restricted,
    Left,
    #[serde(alias = "kicked")]
    Banned,
}

impl MemberStatus {
    /// Returns true if a user with this status is in the chat.
    ///
    /// `is_member` only matters for [`MemberStatus::Restricted`].
    pub fn in_chat(&self, is_member: Option<bool>) -> bool {
        match self {
            MemberStatus::Owner | MemberStatus::Administrator | MemberStatus::Member => true,
            MemberStatus::Restricted => is_member == Some(true),
            MemberStatus::Left | MemberStatus::Banned => false,
        }
    }
}

/// Membership before and after a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub was_member: bool,
    pub is_member: bool,
}

impl StatusChange {
    /// Derives the change from a status update.
    ///
    /// Returns `None` when neither the status nor the restricted membership flag changed.
    pub fn from_update(
        old_status: MemberStatus,
        new_status: MemberStatus,
        old_is_member: Option<bool>,
        new_is_member: Option<bool>,
    ) -> Option<Self> {
        if old_status == new_status && old_is_member == new_is_member {
            return None;
        }

        Some(Self {
            was_member: old_status.in_chat(old_is_member),
            is_member: new_status.in_chat(new_is_member),
        })
    }

    /// Returns true if the user entered the chat.
    pub fn is_join(&self) -> bool {
        !self.was_member && self.is_member
    }
}

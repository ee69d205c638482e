use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{InviteId, RoomId, UserId};

/// A creator's workspace: one owning creator plus the editors they invited
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Room {
    #[must_use]
    pub fn new(name: String, description: String, owner_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: RoomId::new(),
            name,
            description,
            owner_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[must_use]
    pub fn is_owner(&self, user_id: &UserId) -> bool {
        &self.owner_id == user_id
    }
}

/// Room with its editor count, for listings
#[derive(Debug, Clone, Serialize)]
pub struct RoomWithCount {
    #[serde(flatten)]
    pub room: Room,
    pub member_count: i64,
}

/// Editor membership in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMember {
    pub room_id: RoomId,
    pub user_id: UserId,
    /// Invite that was redeemed to join, if any
    pub invite_id: Option<InviteId>,
    pub joined_at: DateTime<Utc>,
}

impl RoomMember {
    #[must_use]
    pub fn new(room_id: RoomId, user_id: UserId, invite_id: Option<InviteId>) -> Self {
        Self {
            room_id,
            user_id,
            invite_id,
            joined_at: Utc::now(),
        }
    }
}

/// Member joined with the user's public profile
#[derive(Debug, Clone, Serialize)]
pub struct RoomMemberWithUser {
    pub user_id: UserId,
    pub username: String,
    pub joined_at: DateTime<Utc>,
}

/// How the acting user relates to a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAccess {
    Owner,
    Member,
}

impl RoomAccess {
    #[must_use]
    pub const fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::id::{InviteId, RoomId, UserId};

/// Length of the opaque invite token (about 190 bits of entropy)
pub const INVITE_TOKEN_LENGTH: usize = 32;

/// Single-use invitation into a room
///
/// The `token` is the secret embedded in the join link. `id` is a public handle
/// the owner uses to list and revoke invites without exposing tokens again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub id: InviteId,
    pub room_id: RoomId,
    pub token: String,
    pub created_by: UserId,
    pub note: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub redeemed_by: Option<UserId>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Why an invite can or cannot be redeemed right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteAvailability {
    Available,
    Expired,
    Revoked,
    Redeemed,
}

impl InviteAvailability {
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl Invite {
    #[must_use]
    pub fn new(room_id: RoomId, created_by: UserId, ttl: Duration, note: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: InviteId::new(),
            room_id,
            token: nanoid::nanoid!(INVITE_TOKEN_LENGTH),
            created_by,
            note,
            expires_at: now + ttl,
            redeemed_by: None,
            redeemed_at: None,
            revoked_at: None,
            created_at: now,
        }
    }

    /// Redeemed and revoked take precedence over expiry so the owner sees what happened
    #[must_use]
    pub fn availability(&self, now: DateTime<Utc>) -> InviteAvailability {
        if self.redeemed_at.is_some() {
            InviteAvailability::Redeemed
        } else if self.revoked_at.is_some() {
            InviteAvailability::Revoked
        } else if self.expires_at <= now {
            InviteAvailability::Expired
        } else {
            InviteAvailability::Available
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite() -> Invite {
        Invite::new(RoomId::new(), UserId::new(), Duration::hours(1), None)
    }

    #[test]
    fn test_new_invite_is_available() {
        let invite = invite();
        assert_eq!(invite.token.len(), INVITE_TOKEN_LENGTH);
        assert_eq!(invite.availability(Utc::now()), InviteAvailability::Available);
    }

    #[test]
    fn test_expired_invite() {
        let invite = invite();
        let later = invite.expires_at + Duration::seconds(1);
        assert_eq!(invite.availability(later), InviteAvailability::Expired);
        // exactly at expiry counts as expired
        assert_eq!(invite.availability(invite.expires_at), InviteAvailability::Expired);
    }

    #[test]
    fn test_redeemed_wins_over_expired() {
        let mut invite = invite();
        invite.redeemed_at = Some(Utc::now());
        invite.redeemed_by = Some(UserId::new());
        let later = invite.expires_at + Duration::days(1);
        assert_eq!(invite.availability(later), InviteAvailability::Redeemed);
    }

    #[test]
    fn test_revoked_invite() {
        let mut invite = invite();
        invite.revoked_at = Some(Utc::now());
        assert_eq!(invite.availability(Utc::now()), InviteAvailability::Revoked);
        assert!(!invite.availability(Utc::now()).is_available());
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(invite().token, invite().token);
    }
}

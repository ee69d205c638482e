use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::{
    config::{InviteConfig, MAX_INVITE_TTL_HOURS, MIN_INVITE_TTL_HOURS},
    models::{
        Actor, Invite, InviteAvailability, InviteId, Room, RoomId, RoomMember,
        INVITE_TOKEN_LENGTH,
    },
    repository::{InviteRepository, RoomRepository, UserRepository},
    service::RoomService,
    transaction::UnitOfWork,
    Error, Result,
};

const MAX_NOTE_LENGTH: usize = 500;

/// Invite as shown to the room owner, with the shareable link
#[derive(Debug, Clone, Serialize)]
pub struct InviteWithLink {
    #[serde(flatten)]
    pub invite: Invite,
    pub availability: InviteAvailability,
    pub join_url: String,
}

/// What an invite link leads to, shown before the editor accepts
#[derive(Debug, Clone, Serialize)]
pub struct InvitePreview {
    pub room_id: RoomId,
    pub room_name: String,
    pub owner_username: String,
    pub expires_at: DateTime<Utc>,
    pub availability: InviteAvailability,
}

#[derive(Clone)]
pub struct InviteService {
    pool: PgPool,
    invite_repo: InviteRepository,
    room_repo: RoomRepository,
    user_repo: UserRepository,
    rooms: RoomService,
    config: InviteConfig,
}

impl std::fmt::Debug for InviteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteService").finish()
    }
}

impl InviteService {
    #[must_use]
    pub fn new(pool: PgPool, rooms: RoomService, config: InviteConfig) -> Self {
        Self {
            invite_repo: InviteRepository::new(pool.clone()),
            room_repo: RoomRepository::new(pool.clone()),
            user_repo: UserRepository::new(pool.clone()),
            pool,
            rooms,
            config,
        }
    }

    pub async fn create_invite(
        &self,
        room_id: &RoomId,
        actor: &Actor,
        ttl_hours: Option<i64>,
        note: Option<String>,
    ) -> Result<InviteWithLink> {
        let ttl_hours = ttl_hours.unwrap_or(self.config.default_ttl_hours);
        if !(MIN_INVITE_TTL_HOURS..=MAX_INVITE_TTL_HOURS).contains(&ttl_hours) {
            return Err(Error::InvalidInput(format!(
                "Invite lifetime must be between {MIN_INVITE_TTL_HOURS} and {MAX_INVITE_TTL_HOURS} hours"
            )));
        }
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LENGTH) {
            return Err(Error::InvalidInput(format!(
                "Invite note must be at most {MAX_NOTE_LENGTH} characters"
            )));
        }

        let room = self.rooms.require_owner(room_id, &actor.user_id).await?;

        let invite = Invite::new(
            room.id.clone(),
            actor.user_id.clone(),
            Duration::hours(ttl_hours),
            note,
        );
        let invite = self.invite_repo.create(&invite).await?;
        tracing::info!(
            room_id = %room.id,
            invite_id = %invite.id,
            expires_at = %invite.expires_at,
            "Invite created"
        );

        Ok(self.with_link(invite))
    }

    /// All invites of a room, newest first
    pub async fn list_invites(&self, room_id: &RoomId, actor: &Actor) -> Result<Vec<InviteWithLink>> {
        self.rooms.require_owner(room_id, &actor.user_id).await?;
        let invites = self.invite_repo.list_by_room(room_id).await?;
        Ok(invites.into_iter().map(|i| self.with_link(i)).collect())
    }

    /// Revoke an unused invite. Revoking twice is a no-op.
    pub async fn revoke_invite(
        &self,
        room_id: &RoomId,
        invite_id: &InviteId,
        actor: &Actor,
    ) -> Result<()> {
        self.rooms.require_owner(room_id, &actor.user_id).await?;

        let invite = self
            .invite_repo
            .get_by_id(invite_id)
            .await?
            .filter(|i| &i.room_id == room_id)
            .ok_or_else(|| Error::NotFound("Invite not found".to_string()))?;

        match invite.availability(Utc::now()) {
            InviteAvailability::Redeemed => Err(Error::Conflict(
                "Invite has already been redeemed".to_string(),
            )),
            InviteAvailability::Revoked => Ok(()),
            InviteAvailability::Available | InviteAvailability::Expired => {
                if !self.invite_repo.revoke(invite_id).await? {
                    // Redeemed between the read and the update
                    return Err(Error::Conflict(
                        "Invite has already been redeemed".to_string(),
                    ));
                }
                tracing::info!(room_id = %room_id, invite_id = %invite_id, "Invite revoked");
                Ok(())
            }
        }
    }

    /// Look up an invite without consuming it
    pub async fn resolve(&self, token: &str) -> Result<InvitePreview> {
        let invite = self.find_by_token(token).await?;
        let room = self.live_room(&invite.room_id).await?;
        let owner = self
            .user_repo
            .get_by_id(&room.owner_id)
            .await?
            .ok_or_else(|| Error::NotFound("Invite not found".to_string()))?;

        Ok(InvitePreview {
            room_id: room.id,
            room_name: room.name,
            owner_username: owner.username,
            expires_at: invite.expires_at,
            availability: invite.availability(Utc::now()),
        })
    }

    /// Exchange an invite token for membership in its room.
    ///
    /// The invite is consumed and the membership row written in one
    /// transaction; if the membership insert fails the invite stays usable.
    pub async fn redeem(&self, token: &str, actor: &Actor) -> Result<(Room, RoomMember)> {
        if !actor.role.is_editor() {
            return Err(Error::Authorization(
                "Only editor accounts can join rooms by invite".to_string(),
            ));
        }

        let invite = self.find_by_token(token).await?;
        let room = self.live_room(&invite.room_id).await?;

        if room.is_owner(&actor.user_id) {
            return Err(Error::InvalidInput("You already own this room".to_string()));
        }
        match invite.availability(Utc::now()) {
            InviteAvailability::Available => {}
            InviteAvailability::Expired => {
                return Err(Error::InvalidInput("Invite has expired".to_string()))
            }
            InviteAvailability::Revoked => {
                return Err(Error::InvalidInput("Invite has been revoked".to_string()))
            }
            InviteAvailability::Redeemed => {
                return Err(Error::InvalidInput("Invite has already been used".to_string()))
            }
        }
        if self.room_repo.is_member(&room.id, &actor.user_id).await? {
            return Err(Error::AlreadyExists(
                "Already a member of this room".to_string(),
            ));
        }

        let mut uow = UnitOfWork::begin(&self.pool).await?;

        let Some(invite) = self
            .invite_repo
            .redeem_with_executor(&invite.token, &actor.user_id, uow.conn())
            .await?
        else {
            uow.rollback().await?;
            return Err(Error::Conflict("Invite is no longer available".to_string()));
        };

        let member = RoomMember::new(room.id.clone(), actor.user_id.clone(), Some(invite.id.clone()));
        let member = self
            .room_repo
            .add_member_with_executor(&member, uow.conn())
            .await?;

        uow.commit().await?;

        tracing::info!(
            room_id = %room.id,
            invite_id = %invite.id,
            user_id = %actor.user_id,
            "Invite redeemed"
        );
        Ok((room, member))
    }

    async fn find_by_token(&self, token: &str) -> Result<Invite> {
        if !is_well_formed_token(token) {
            return Err(Error::NotFound("Invite not found".to_string()));
        }
        self.invite_repo
            .get_by_token(token)
            .await?
            .ok_or_else(|| Error::NotFound("Invite not found".to_string()))
    }

    /// Invites into deleted rooms behave as if they never existed
    async fn live_room(&self, room_id: &RoomId) -> Result<Room> {
        self.room_repo
            .get_by_id(room_id)
            .await?
            .ok_or_else(|| Error::NotFound("Invite not found".to_string()))
    }

    fn with_link(&self, invite: Invite) -> InviteWithLink {
        InviteWithLink {
            availability: invite.availability(Utc::now()),
            join_url: join_url(&self.config.public_base_url, &invite.token),
            invite,
        }
    }
}

fn join_url(base: &str, token: &str) -> String {
    format!("{}/join/{token}", base.trim_end_matches('/'))
}

/// Tokens are nanoid output; anything else cannot match and skips the query
fn is_well_formed_token(token: &str) -> bool {
    token.len() == INVITE_TOKEN_LENGTH
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

use sqlx::PgPool;

use crate::{
    models::{Actor, Room, RoomAccess, RoomId, RoomMemberWithUser, RoomWithCount, UserId},
    repository::RoomRepository,
    Error, Result,
};

const MAX_ROOM_NAME_LENGTH: usize = 100;
const MAX_ROOM_DESCRIPTION_LENGTH: usize = 2000;

/// Rooms and their editor membership
#[derive(Clone)]
pub struct RoomService {
    room_repo: RoomRepository,
}

impl std::fmt::Debug for RoomService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomService").finish()
    }
}

impl RoomService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            room_repo: RoomRepository::new(pool),
        }
    }

    pub async fn create_room(
        &self,
        actor: &Actor,
        name: &str,
        description: Option<&str>,
    ) -> Result<Room> {
        if !actor.role.is_creator() {
            return Err(Error::Authorization("Only creators can create rooms".to_string()));
        }
        let name = validate_room_name(name)?;
        let description = description.map(str::trim).unwrap_or_default();
        if description.chars().count() > MAX_ROOM_DESCRIPTION_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Room description must be at most {MAX_ROOM_DESCRIPTION_LENGTH} characters"
            )));
        }

        let room = Room::new(name, description.to_string(), actor.user_id.clone());
        let room = self.room_repo.create(&room).await?;
        tracing::info!(room_id = %room.id, owner_id = %room.owner_id, "Room created");
        Ok(room)
    }

    /// Rooms the actor owns (creators) or has joined (editors)
    pub async fn list_rooms_for(&self, actor: &Actor) -> Result<Vec<RoomWithCount>> {
        if actor.role.is_creator() {
            self.room_repo.list_owned(&actor.user_id).await
        } else {
            self.room_repo.list_joined(&actor.user_id).await
        }
    }

    /// Load a room and work out how `user_id` relates to it.
    ///
    /// Users with no relation get `Authorization`, unknown or deleted rooms `NotFound`.
    pub async fn access(&self, room_id: &RoomId, user_id: &UserId) -> Result<(Room, RoomAccess)> {
        let room = self
            .room_repo
            .get_by_id(room_id)
            .await?
            .ok_or_else(|| Error::NotFound("Room not found".to_string()))?;

        if room.is_owner(user_id) {
            return Ok((room, RoomAccess::Owner));
        }
        if self.room_repo.is_member(room_id, user_id).await? {
            return Ok((room, RoomAccess::Member));
        }
        Err(Error::Authorization("Not a member of this room".to_string()))
    }

    /// Like [`Self::access`] but only lets the owner through
    pub async fn require_owner(&self, room_id: &RoomId, user_id: &UserId) -> Result<Room> {
        let (room, access) = self.access(room_id, user_id).await?;
        if access.is_owner() {
            Ok(room)
        } else {
            Err(Error::Authorization(
                "Only the room owner can do this".to_string(),
            ))
        }
    }

    pub async fn get_room(&self, room_id: &RoomId, actor: &Actor) -> Result<(Room, RoomAccess)> {
        self.access(room_id, &actor.user_id).await
    }

    pub async fn list_members(
        &self,
        room_id: &RoomId,
        actor: &Actor,
    ) -> Result<Vec<RoomMemberWithUser>> {
        self.access(room_id, &actor.user_id).await?;
        self.room_repo.list_members(room_id).await
    }

    pub async fn remove_member(
        &self,
        room_id: &RoomId,
        actor: &Actor,
        target: &UserId,
    ) -> Result<()> {
        let room = self.require_owner(room_id, &actor.user_id).await?;
        if room.is_owner(target) {
            return Err(Error::InvalidInput(
                "The room owner cannot be removed".to_string(),
            ));
        }
        if !self.room_repo.remove_member(room_id, target).await? {
            return Err(Error::NotFound("Member not found".to_string()));
        }
        tracing::info!(room_id = %room_id, user_id = %target, "Member removed");
        Ok(())
    }

    pub async fn leave_room(&self, room_id: &RoomId, actor: &Actor) -> Result<()> {
        let (_, access) = self.access(room_id, &actor.user_id).await?;
        if access.is_owner() {
            return Err(Error::InvalidInput(
                "Owners cannot leave their own room; delete it instead".to_string(),
            ));
        }
        self.room_repo.remove_member(room_id, &actor.user_id).await?;
        tracing::info!(room_id = %room_id, user_id = %actor.user_id, "Member left room");
        Ok(())
    }

    /// Soft delete; videos and invites stay in the database but become unreachable
    pub async fn delete_room(&self, room_id: &RoomId, actor: &Actor) -> Result<()> {
        self.require_owner(room_id, &actor.user_id).await?;
        if !self.room_repo.delete(room_id).await? {
            return Err(Error::NotFound("Room not found".to_string()));
        }
        tracing::info!(room_id = %room_id, "Room deleted");
        Ok(())
    }
}

fn validate_room_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Room name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_ROOM_NAME_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Room name must be at most {MAX_ROOM_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

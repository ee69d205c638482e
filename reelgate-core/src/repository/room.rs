use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{InviteId, Room, RoomId, RoomMember, RoomMemberWithUser, RoomWithCount, UserId},
    Result,
};

const ROOM_COLUMNS: &str =
    "r.id, r.name, r.description, r.owner_id, r.created_at, r.updated_at, r.deleted_at";

/// Room and membership repository
#[derive(Clone)]
pub struct RoomRepository {
    pool: PgPool,
}

impl RoomRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new room
    pub async fn create(&self, room: &Room) -> Result<Room> {
        let row = sqlx::query(
            "INSERT INTO rooms AS r (id, name, description, owner_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING r.id, r.name, r.description, r.owner_id, r.created_at, r.updated_at, r.deleted_at",
        )
        .bind(room.id.as_str())
        .bind(&room.name)
        .bind(&room.description)
        .bind(room.owner_id.as_str())
        .bind(room.created_at)
        .bind(room.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_room(&row)
    }

    /// Get room by ID
    pub async fn get_by_id(&self, room_id: &RoomId) -> Result<Option<Room>> {
        let row = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms r WHERE r.id = $1 AND r.deleted_at IS NULL"
        ))
        .bind(room_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_room).transpose()
    }

    /// Soft delete room
    pub async fn delete(&self, room_id: &RoomId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE rooms
             SET deleted_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(room_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rooms owned by a creator, with editor counts
    pub async fn list_owned(&self, owner_id: &UserId) -> Result<Vec<RoomWithCount>> {
        let rows = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS},
                    (SELECT COUNT(*) FROM room_members rm WHERE rm.room_id = r.id) AS member_count
             FROM rooms r
             WHERE r.owner_id = $1 AND r.deleted_at IS NULL
             ORDER BY r.created_at DESC"
        ))
        .bind(owner_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_room_with_count).collect()
    }

    /// Rooms an editor has joined, with editor counts
    pub async fn list_joined(&self, user_id: &UserId) -> Result<Vec<RoomWithCount>> {
        let rows = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS},
                    (SELECT COUNT(*) FROM room_members c WHERE c.room_id = r.id) AS member_count
             FROM rooms r
             JOIN room_members m ON m.room_id = r.id
             WHERE m.user_id = $1 AND r.deleted_at IS NULL
             ORDER BY m.joined_at DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_room_with_count).collect()
    }

    /// Check membership
    pub async fn is_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM room_members WHERE room_id = $1 AND user_id = $2)",
        )
        .bind(room_id.as_str())
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert a membership row using a provided executor (pool or transaction)
    pub async fn add_member_with_executor<'e, E>(
        &self,
        member: &RoomMember,
        executor: E,
    ) -> Result<RoomMember>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            "INSERT INTO room_members (room_id, user_id, invite_id, joined_at)
             VALUES ($1, $2, $3, $4)
             RETURNING room_id, user_id, invite_id, joined_at",
        )
        .bind(member.room_id.as_str())
        .bind(member.user_id.as_str())
        .bind(member.invite_id.as_ref().map(InviteId::as_str))
        .bind(member.joined_at)
        .fetch_one(executor)
        .await?;

        Ok(RoomMember {
            room_id: RoomId::from_string(row.try_get("room_id")?),
            user_id: UserId::from_string(row.try_get("user_id")?),
            invite_id: row
                .try_get::<Option<String>, _>("invite_id")?
                .map(InviteId::from_string),
            joined_at: row.try_get("joined_at")?,
        })
    }

    /// Remove a member; returns whether a row was deleted
    pub async fn remove_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id.as_str())
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List members with usernames, oldest first
    pub async fn list_members(&self, room_id: &RoomId) -> Result<Vec<RoomMemberWithUser>> {
        let rows = sqlx::query(
            "SELECT m.user_id, u.username, m.joined_at
             FROM room_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.room_id = $1 AND u.deleted_at IS NULL
             ORDER BY m.joined_at ASC",
        )
        .bind(room_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RoomMemberWithUser {
                    user_id: UserId::from_string(row.try_get("user_id")?),
                    username: row.try_get("username")?,
                    joined_at: row.try_get("joined_at")?,
                })
            })
            .collect()
    }

    fn row_to_room(row: &PgRow) -> Result<Room> {
        Ok(Room {
            id: RoomId::from_string(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            owner_id: UserId::from_string(row.try_get("owner_id")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    fn row_to_room_with_count(row: &PgRow) -> Result<RoomWithCount> {
        Ok(RoomWithCount {
            room: Self::row_to_room(row)?,
            member_count: row.try_get("member_count")?,
        })
    }
}

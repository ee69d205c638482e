use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{Invite, InviteId, RoomId, UserId},
    Result,
};

const INVITE_COLUMNS: &str = "id, room_id, token, created_by, note, expires_at, \
     redeemed_by, redeemed_at, revoked_at, created_at";

#[derive(Clone)]
pub struct InviteRepository {
    pool: PgPool,
}

impl InviteRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, invite: &Invite) -> Result<Invite> {
        let row = sqlx::query(&format!(
            "INSERT INTO invites (id, room_id, token, created_by, note, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {INVITE_COLUMNS}"
        ))
        .bind(invite.id.as_str())
        .bind(invite.room_id.as_str())
        .bind(&invite.token)
        .bind(invite.created_by.as_str())
        .bind(invite.note.as_ref())
        .bind(invite.expires_at)
        .bind(invite.created_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_invite(&row)
    }

    pub async fn get_by_id(&self, invite_id: &InviteId) -> Result<Option<Invite>> {
        let row = sqlx::query(&format!("SELECT {INVITE_COLUMNS} FROM invites WHERE id = $1"))
            .bind(invite_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_invite).transpose()
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Option<Invite>> {
        let row = sqlx::query(&format!("SELECT {INVITE_COLUMNS} FROM invites WHERE token = $1"))
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_invite).transpose()
    }

    /// All invites for a room, newest first
    pub async fn list_by_room(&self, room_id: &RoomId) -> Result<Vec<Invite>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE room_id = $1 ORDER BY created_at DESC"
        ))
        .bind(room_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_invite).collect()
    }

    /// Mark an unredeemed invite as revoked. Returns false when nothing changed.
    pub async fn revoke(&self, invite_id: &InviteId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE invites SET revoked_at = NOW()
             WHERE id = $1 AND revoked_at IS NULL AND redeemed_at IS NULL",
        )
        .bind(invite_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Consume an invite if it is still redeemable.
    ///
    /// The availability check and the write happen in one statement, so two
    /// concurrent redemptions of the same token cannot both succeed. Returns
    /// `None` when the token is unknown, expired, revoked or already used.
    pub async fn redeem_with_executor<'e, E>(
        &self,
        token: &str,
        user_id: &UserId,
        executor: E,
    ) -> Result<Option<Invite>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(&format!(
            "UPDATE invites
             SET redeemed_by = $2, redeemed_at = NOW()
             WHERE token = $1
               AND redeemed_at IS NULL
               AND revoked_at IS NULL
               AND expires_at > NOW()
             RETURNING {INVITE_COLUMNS}"
        ))
        .bind(token)
        .bind(user_id.as_str())
        .fetch_optional(executor)
        .await?;

        row.as_ref().map(Self::row_to_invite).transpose()
    }

    fn row_to_invite(row: &PgRow) -> Result<Invite> {
        Ok(Invite {
            id: InviteId::from_string(row.try_get("id")?),
            room_id: RoomId::from_string(row.try_get("room_id")?),
            token: row.try_get::<String, _>("token")?.trim_end().to_string(),
            created_by: UserId::from_string(row.try_get("created_by")?),
            note: row.try_get("note")?,
            expires_at: row.try_get("expires_at")?,
            redeemed_by: row
                .try_get::<Option<String>, _>("redeemed_by")?
                .map(UserId::from_string),
            redeemed_at: row.try_get("redeemed_at")?,
            revoked_at: row.try_get("revoked_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

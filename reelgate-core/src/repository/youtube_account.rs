use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{UserId, YouTubeAccount},
    Result,
};

const ACCOUNT_COLUMNS: &str = "user_id, channel_id, channel_title, access_token, refresh_token, \
     expires_at, scope, created_at, updated_at";

/// Stored YouTube credentials, one row per creator.
/// Token columns are written and read as ciphertext; this layer never decrypts.
#[derive(Clone)]
pub struct YouTubeAccountRepository {
    pool: PgPool,
}

impl YouTubeAccountRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a creator's linked account.
    ///
    /// Google only returns a refresh token on the first consent, so a missing
    /// one keeps whatever was stored before.
    pub async fn upsert(&self, account: &YouTubeAccount) -> Result<YouTubeAccount> {
        let row = sqlx::query(&format!(
            "INSERT INTO youtube_accounts (
                user_id, channel_id, channel_title, access_token, refresh_token,
                expires_at, scope, created_at, updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             ON CONFLICT (user_id) DO UPDATE SET
                channel_id = COALESCE(EXCLUDED.channel_id, youtube_accounts.channel_id),
                channel_title = COALESCE(EXCLUDED.channel_title, youtube_accounts.channel_title),
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, youtube_accounts.refresh_token),
                expires_at = EXCLUDED.expires_at,
                scope = EXCLUDED.scope,
                updated_at = EXCLUDED.updated_at
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(account.user_id.as_str())
        .bind(account.channel_id.as_ref())
        .bind(account.channel_title.as_ref())
        .bind(&account.access_token)
        .bind(account.refresh_token.as_ref())
        .bind(account.expires_at)
        .bind(&account.scope)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_account(&row)
    }

    pub async fn get(&self, user_id: &UserId) -> Result<Option<YouTubeAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM youtube_accounts WHERE user_id = $1"
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Replace the access token after a refresh
    pub async fn update_tokens(
        &self,
        user_id: &UserId,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE youtube_accounts
             SET access_token = $2,
                 refresh_token = COALESCE($3, refresh_token),
                 expires_at = $4,
                 updated_at = NOW()
             WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, user_id: &UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM youtube_accounts WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_account(row: &PgRow) -> Result<YouTubeAccount> {
        Ok(YouTubeAccount {
            user_id: UserId::from_string(row.try_get("user_id")?),
            channel_id: row.try_get("channel_id")?,
            channel_title: row.try_get("channel_title")?,
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            expires_at: row.try_get("expires_at")?,
            scope: row.try_get("scope")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

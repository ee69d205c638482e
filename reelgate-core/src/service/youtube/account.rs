use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use moka::future::Cache;
use sqlx::PgPool;

use super::{OAuthTokens, VideoPublisher, YouTubeOAuth};
use crate::{
    models::{Actor, UserId, YouTubeAccount},
    repository::YouTubeAccountRepository,
    service::CredentialEncryption,
    Error, Result,
};

/// How long a consent round-trip may take
const STATE_TTL: StdDuration = StdDuration::from_secs(10 * 60);
const MAX_PENDING_STATES: u64 = 10_000;

/// Refresh tokens this close to expiry instead of handing them out
const REFRESH_MARGIN_SECS: i64 = 60;

/// Links creators to their YouTube channel and hands out working access tokens
#[derive(Clone)]
pub struct YouTubeAccountService {
    repository: YouTubeAccountRepository,
    oauth: Option<YouTubeOAuth>,
    publisher: Arc<dyn VideoPublisher>,
    encryption: CredentialEncryption,
    /// state token -> user who started the flow
    pending: Cache<String, UserId>,
}

impl std::fmt::Debug for YouTubeAccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeAccountService")
            .field("configured", &self.oauth.is_some())
            .field("encryption", &self.encryption)
            .finish_non_exhaustive()
    }
}

impl YouTubeAccountService {
    /// `oauth` is `None` when no Google client is configured; connecting is
    /// then refused but stored accounts can still be listed and removed.
    #[must_use]
    pub fn new(
        pool: PgPool,
        oauth: Option<YouTubeOAuth>,
        publisher: Arc<dyn VideoPublisher>,
        encryption: CredentialEncryption,
    ) -> Self {
        Self {
            repository: YouTubeAccountRepository::new(pool),
            oauth,
            publisher,
            encryption,
            pending: Cache::builder()
                .max_capacity(MAX_PENDING_STATES)
                .time_to_live(STATE_TTL)
                .build(),
        }
    }

    fn oauth(&self) -> Result<&YouTubeOAuth> {
        self.oauth
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("YouTube integration is not configured".to_string()))
    }

    /// Start the consent flow; returns the Google URL to send the browser to
    pub async fn begin_connect(&self, actor: &Actor) -> Result<String> {
        if !actor.role.is_creator() {
            return Err(Error::Authorization(
                "Only creators can connect a YouTube channel".to_string(),
            ));
        }
        let oauth = self.oauth()?;

        let state = nanoid::nanoid!(32);
        self.pending.insert(state.clone(), actor.user_id.clone()).await;
        Ok(oauth.authorize_url(&state))
    }

    /// Finish the consent flow from Google's redirect
    pub async fn complete_connect(&self, state: &str, code: &str) -> Result<YouTubeAccount> {
        let oauth = self.oauth()?;
        let user_id = self
            .pending
            .remove(state)
            .await
            .ok_or_else(|| Error::InvalidInput("OAuth state is invalid or expired".to_string()))?;

        let tokens = oauth.exchange_code(code).await?;

        let channel = match self.publisher.fetch_channel(&tokens.access_token).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Could not look up YouTube channel");
                None
            }
        };

        let now = Utc::now();
        let account = YouTubeAccount {
            user_id: user_id.clone(),
            channel_id: channel.as_ref().map(|c| c.id.clone()),
            channel_title: channel.map(|c| c.title),
            access_token: self.encryption.encrypt(&tokens.access_token)?,
            refresh_token: tokens
                .refresh_token
                .as_deref()
                .map(|t| self.encryption.encrypt(t))
                .transpose()?,
            expires_at: tokens.expires_at,
            scope: tokens.scope,
            created_at: now,
            updated_at: now,
        };

        let account = self.repository.upsert(&account).await?;
        tracing::info!(
            user_id = %user_id,
            channel_id = account.channel_id.as_deref().unwrap_or("-"),
            "YouTube account connected"
        );
        Ok(account)
    }

    pub async fn status(&self, user_id: &UserId) -> Result<Option<YouTubeAccount>> {
        self.repository.get(user_id).await
    }

    /// Forget stored credentials. The grant itself stays valid on Google's
    /// side until the user revokes it there.
    pub async fn disconnect(&self, user_id: &UserId) -> Result<()> {
        if !self.repository.delete(user_id).await? {
            return Err(Error::NotFound("No YouTube account connected".to_string()));
        }
        tracing::info!(user_id = %user_id, "YouTube account disconnected");
        Ok(())
    }

    /// A usable access token for `user_id`, refreshing and persisting it when close to expiry
    pub async fn access_token(&self, user_id: &UserId) -> Result<String> {
        let account = self
            .repository
            .get(user_id)
            .await?
            .ok_or_else(|| Error::InvalidInput("YouTube account not connected".to_string()))?;

        if account.expires_at > Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS) {
            return self.encryption.decrypt(&account.access_token);
        }

        let refresh_token = account
            .refresh_token
            .as_deref()
            .map(|t| self.encryption.decrypt(t))
            .transpose()?
            .ok_or_else(|| {
                Error::Authentication(
                    "YouTube access expired and no refresh token is stored; reconnect the account"
                        .to_string(),
                )
            })?;

        let tokens = self.oauth()?.refresh(&refresh_token).await?;
        self.store_refreshed(user_id, &tokens).await?;
        tracing::debug!(user_id = %user_id, expires_at = %tokens.expires_at, "Refreshed YouTube token");

        Ok(tokens.access_token)
    }

    async fn store_refreshed(&self, user_id: &UserId, tokens: &OAuthTokens) -> Result<()> {
        let access = self.encryption.encrypt(&tokens.access_token)?;
        let refresh = tokens
            .refresh_token
            .as_deref()
            .map(|t| self.encryption.encrypt(t))
            .transpose()?;
        self.repository
            .update_tokens(user_id, &access, refresh.as_deref(), tokens.expires_at)
            .await?;
        Ok(())
    }
}

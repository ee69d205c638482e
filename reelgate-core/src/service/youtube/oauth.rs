//! Google OAuth client for the YouTube scopes

use chrono::{DateTime, Duration, Utc};
use oauth2::{
    basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicTokenResponse},
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};

use crate::{config::YouTubeConfig, Error, Result};

pub const SCOPE_UPLOAD: &str = "https://www.googleapis.com/auth/youtube.upload";
pub const SCOPE_READONLY: &str = "https://www.googleapis.com/auth/youtube.readonly";

/// Used when Google omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Tokens returned by a code exchange or refresh
#[derive(Clone)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

impl std::fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Clone)]
pub struct YouTubeOAuth {
    client: GoogleClient,
    http_client: oauth2::reqwest::Client,
}

impl std::fmt::Debug for YouTubeOAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeOAuth")
            .field("client_id", &self.client.client_id().as_str())
            .finish_non_exhaustive()
    }
}

impl YouTubeOAuth {
    pub fn new(config: &YouTubeConfig) -> Result<Self> {
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| Error::InvalidInput(format!("Invalid youtube.auth_url: {e}")))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| Error::InvalidInput(format!("Invalid youtube.token_url: {e}")))?;
        let redirect_url = RedirectUrl::new(config.redirect_url.clone())
            .map_err(|e| Error::InvalidInput(format!("Invalid youtube.redirect_url: {e}")))?;

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        // Token endpoint responses must not be followed to other hosts
        let http_client = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build OAuth HTTP client: {e}")))?;

        Ok(Self {
            client,
            http_client,
        })
    }

    /// Consent URL requesting offline access, so Google issues a refresh token
    #[must_use]
    pub fn authorize_url(&self, state: &str) -> String {
        let state = state.to_string();
        let (url, _) = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scope(Scope::new(SCOPE_UPLOAD.to_string()))
            .add_scope(Scope::new(SCOPE_READONLY.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .add_extra_param("include_granted_scopes", "true")
            .url();
        url.to_string()
    }

    pub async fn exchange_code(&self, code: &str) -> Result<OAuthTokens> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| map_token_error(&e, "exchange authorization code"))?;

        Ok(Self::tokens_from(&response))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| map_token_error(&e, "refresh access token"))?;

        Ok(Self::tokens_from(&response))
    }

    fn tokens_from(response: &BasicTokenResponse) -> OAuthTokens {
        let lifetime = response
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .unwrap_or_else(|| Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
        let scope = response
            .scopes()
            .map(|scopes| {
                scopes
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        OAuthTokens {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            expires_at: Utc::now() + lifetime,
            scope,
        }
    }
}

fn map_token_error<RE>(err: &RequestTokenError<RE, BasicErrorResponse>, action: &str) -> Error
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp)
            if resp.error() == &BasicErrorResponseType::InvalidGrant =>
        {
            Error::Authentication(
                "YouTube authorization is no longer valid; reconnect the account".to_string(),
            )
        }
        RequestTokenError::ServerResponse(resp) => {
            let detail = resp
                .error_description()
                .cloned()
                .unwrap_or_else(|| resp.error().to_string());
            Error::External(format!("Google refused to {action}: {detail}"))
        }
        other => Error::External(format!("Failed to {action}: {other}")),
    }
}

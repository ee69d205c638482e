use chrono::{DateTime, Utc};
use serde::Serialize;

use super::id::UserId;

/// A creator's linked YouTube channel
///
/// Token fields hold ciphertext produced by `CredentialEncryption`; they are
/// never serialized to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct YouTubeAccount {
    pub user_id: UserId,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

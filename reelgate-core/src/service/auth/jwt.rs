use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, TokenData,
    Validation,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    config::JwtConfig,
    models::{UserId, UserRole},
    Error, Result,
};

/// Clock skew tolerated when checking `exp`
const LEEWAY_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Account role (creator, editor)
    pub role: String,
    /// Token type (access or refresh)
    pub typ: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_string(self.sub.clone())
    }

    pub fn role(&self) -> Result<UserRole> {
        UserRole::from_str(&self.role)
            .map_err(|_| Error::Authentication(format!("Invalid role in token: {}", self.role)))
    }

    #[must_use]
    pub fn is_access_token(&self) -> bool {
        self.typ == TokenType::Access.as_str()
    }

    #[must_use]
    pub fn is_refresh_token(&self) -> bool {
        self.typ == TokenType::Refresh.as_str()
    }
}

/// JWT service for signing and verifying tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl JwtService {
    /// Create a service signing with RS256 from PEM-encoded keys
    pub fn from_rsa_pem(private_key_pem: &[u8], public_key_pem: &[u8]) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| Error::Internal(format!("Failed to load private key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| Error::Internal(format!("Failed to load public key: {e}")))?;

        Ok(Self::with_keys(encoding_key, decoding_key, Algorithm::RS256))
    }

    /// Create a service signing with HS256 from a shared secret
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        Self::with_keys(
            EncodingKey::from_secret(secret),
            DecodingKey::from_secret(secret),
            Algorithm::HS256,
        )
    }

    /// Build from configuration: a shared secret wins over key files
    pub fn from_config(config: &JwtConfig) -> Result<Self> {
        let service = if config.secret.is_empty() {
            let private_pem = std::fs::read(&config.private_key_path).map_err(|e| {
                Error::Internal(format!(
                    "Failed to read JWT private key {}: {e}",
                    config.private_key_path
                ))
            })?;
            let public_pem = std::fs::read(&config.public_key_path).map_err(|e| {
                Error::Internal(format!(
                    "Failed to read JWT public key {}: {e}",
                    config.public_key_path
                ))
            })?;
            Self::from_rsa_pem(&private_pem, &public_pem)?
        } else {
            Self::from_secret(config.secret.as_bytes())
        };

        let access_ttl = i64::try_from(config.access_token_duration_hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or_else(|| Error::InvalidInput("jwt.access_token_duration_hours is too large".to_string()))?;
        let refresh_ttl = i64::try_from(config.refresh_token_duration_days)
            .ok()
            .and_then(Duration::try_days)
            .ok_or_else(|| Error::InvalidInput("jwt.refresh_token_duration_days is too large".to_string()))?;

        Ok(service.with_durations(access_ttl, refresh_ttl))
    }

    fn with_keys(encoding_key: EncodingKey, decoding_key: DecodingKey, algorithm: Algorithm) -> Self {
        Self {
            encoding_key: Arc::new(encoding_key),
            decoding_key: Arc::new(decoding_key),
            algorithm,
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::days(30),
        }
    }

    #[must_use]
    pub fn with_durations(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    /// Lifetime of access tokens, reported to clients as `expires_in`
    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn sign_token(
        &self,
        user_id: &UserId,
        role: UserRole,
        token_type: TokenType,
    ) -> Result<String> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: user_id.as_str().to_string(),
            role: role.as_str().to_string(),
            typ: token_type.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token and extract claims
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = LEEWAY_SECS;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data: TokenData<Claims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::Authentication("Token expired".to_string()),
                ErrorKind::InvalidSignature => {
                    Error::Authentication("Invalid token signature".to_string())
                }
                _ => Error::Authentication("Invalid token".to_string()),
            })?;

        Ok(token_data.claims)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let claims = self.verify_token(token)?;
        if !claims.is_access_token() {
            return Err(Error::Authentication("Not an access token".to_string()));
        }
        Ok(claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims> {
        let claims = self.verify_token(token)?;
        if !claims.is_refresh_token() {
            return Err(Error::Authentication("Not a refresh token".to_string()));
        }
        Ok(claims)
    }
}

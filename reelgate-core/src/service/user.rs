use serde::Serialize;
use sqlx::PgPool;

use crate::{
    models::{User, UserId, UserRole},
    repository::UserRepository,
    service::auth::{
        check_password_policy, hash_password, verify_password, JwtService, TokenType,
        DUMMY_PASSWORD_HASH,
    },
    Error, Result,
};

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 32;

/// Access and refresh token issued together
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// User service for business logic
#[derive(Clone)]
pub struct UserService {
    repository: UserRepository,
    jwt_service: JwtService,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService").finish()
    }
}

impl UserService {
    #[must_use]
    pub fn new(pool: PgPool, jwt_service: JwtService) -> Self {
        Self {
            repository: UserRepository::new(pool),
            jwt_service,
        }
    }

    /// Register a new creator or editor account and sign them in
    pub async fn register(
        &self,
        username: String,
        password: String,
        email: Option<String>,
        role: UserRole,
    ) -> Result<(User, TokenPair)> {
        let username = username.trim().to_string();
        validate_username(&username)?;
        check_password_policy(&password)?;
        let email = match email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
            Some(email) => {
                validate_email(&email)?;
                Some(email)
            }
            None => None,
        };

        if self.repository.username_exists(&username).await? {
            return Err(Error::AlreadyExists("Username already taken".to_string()));
        }

        let password_hash = hash_password(&password).await?;

        // The unique index still guards against a concurrent registration
        let user = self
            .repository
            .create(&User::new(username, email, password_hash, role))
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        let tokens = self.issue_tokens(&user)?;
        Ok((user, tokens))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(User, TokenPair)> {
        let invalid = || Error::Authentication("Invalid username or password".to_string());

        let Some(user) = self.repository.get_by_username(username.trim()).await? else {
            // Equal Argon2 cost whether or not the user exists
            verify_password(password, DUMMY_PASSWORD_HASH).await?;
            return Err(invalid());
        };

        if !verify_password(password, &user.password_hash).await? {
            return Err(invalid());
        }

        let tokens = self.issue_tokens(&user)?;
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a fresh pair.
    ///
    /// The role is re-read from the database rather than copied from the old token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;

        let user = self
            .repository
            .get_by_id(&claims.user_id())
            .await?
            .ok_or_else(|| Error::Authentication("User not found".to_string()))?;

        self.issue_tokens(&user)
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<User> {
        self.repository
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }

    fn issue_tokens(&self, user: &User) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self
                .jwt_service
                .sign_token(&user.id, user.role, TokenType::Access)?,
            refresh_token: self
                .jwt_service
                .sign_token(&user.id, user.role, TokenType::Refresh)?,
            token_type: "Bearer",
            expires_in: self.jwt_service.access_ttl().num_seconds(),
        })
    }
}

pub(crate) fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(Error::InvalidInput(format!(
            "Username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(Error::InvalidInput(
            "Username may only contain letters, digits, '_', '.' and '-'".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput("Invalid email address".to_string()))
    }
}

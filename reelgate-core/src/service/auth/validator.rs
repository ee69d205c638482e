//! Bearer-token validation shared by the HTTP extractors

use super::{jwt::JwtService, Claims};
use crate::{models::UserId, Error, Result};
use std::sync::Arc;

/// Turns an `Authorization` header value into verified access-token claims
#[derive(Clone)]
pub struct JwtValidator {
    jwt_service: Arc<JwtService>,
}

impl JwtValidator {
    #[must_use]
    pub const fn new(jwt_service: Arc<JwtService>) -> Self {
        Self { jwt_service }
    }

    /// Extract bearer token from an Authorization header value.
    ///
    /// The scheme is matched case-insensitively.
    pub fn extract_bearer_token(auth_value: &str) -> Result<&str> {
        let (scheme, token) = auth_value.trim().split_once(' ').ok_or_else(|| {
            Error::Authentication("Authorization header must start with 'Bearer '".to_string())
        })?;

        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(Error::Authentication(
                "Authorization header must start with 'Bearer '".to_string(),
            ));
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Authentication("Missing bearer token".to_string()));
        }
        Ok(token)
    }

    /// Verify an access token (signature, expiry and type)
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        self.jwt_service.verify_access_token(token)
    }

    /// Validate JWT from HTTP Authorization header
    pub fn validate_http(&self, auth_header: &str) -> Result<Claims> {
        let token = Self::extract_bearer_token(auth_header)?;
        self.validate_token(token)
    }

    pub fn validate_http_extract_user_id(&self, auth_header: &str) -> Result<UserId> {
        Ok(self.validate_http(auth_header)?.user_id())
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::service::auth::TokenType;

    fn create_test_jwt_service() -> Arc<JwtService> {
        Arc::new(JwtService::from_secret(b"validator-test-secret-validator-test"))
    }

    fn create_test_token(jwt_service: &JwtService, user_id: &str) -> String {
        let user_id = UserId::from_string(user_id.to_string());
        jwt_service
            .sign_token(&user_id, UserRole::Editor, TokenType::Access)
            .unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(JwtValidator::extract_bearer_token("Bearer abc123").unwrap(), "abc123");
        assert_eq!(JwtValidator::extract_bearer_token("bearer def456").unwrap(), "def456");
        assert_eq!(JwtValidator::extract_bearer_token("BEARER  ghi").unwrap(), "ghi");

        assert!(JwtValidator::extract_bearer_token("Basic abc123").is_err());
        assert!(JwtValidator::extract_bearer_token("Bearer").is_err());
        assert!(JwtValidator::extract_bearer_token("Bearer   ").is_err());
    }

    #[test]
    fn test_validate_http() {
        let jwt_service = create_test_jwt_service();
        let validator = JwtValidator::new(jwt_service.clone());
        let token = create_test_token(&jwt_service, "user456user4");

        let claims = validator.validate_http(&format!("Bearer {token}")).unwrap();
        assert_eq!(claims.sub, "user456user4");

        assert!(validator.validate_http("Basic invalid").is_err());
        assert!(validator.validate_http("Bearer invalid.token.here").is_err());
    }

    #[test]
    fn test_refresh_token_rejected_as_bearer() {
        let jwt_service = create_test_jwt_service();
        let validator = JwtValidator::new(jwt_service.clone());
        let refresh = jwt_service
            .sign_token(&UserId::new(), UserRole::Creator, TokenType::Refresh)
            .unwrap();

        assert!(validator.validate_http(&format!("Bearer {refresh}")).is_err());
    }

    #[test]
    fn test_validate_http_extract_user_id() {
        let jwt_service = create_test_jwt_service();
        let validator = JwtValidator::new(jwt_service.clone());
        let token = create_test_token(&jwt_service, "user789user7");

        let user_id = validator
            .validate_http_extract_user_id(&format!("Bearer {token}"))
            .unwrap();
        assert_eq!(user_id.as_str(), "user789user7");
    }
}

// HTTP middleware and authentication extractors

use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use reelgate_core::{
    models::{Actor, UserId, UserRole},
    Error,
};

use super::{AppError, AppState};

/// Authenticated user extracted from a bearer access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: UserRole,
}

impl AuthUser {
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id.clone(), self.role)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;
        let auth_str = auth_header
            .to_str()
            .map_err(|e| AppError::unauthorized(format!("Invalid Authorization header: {e}")))?;

        let claims = app_state
            .jwt_validator
            .validate_http(auth_str)
            .map_err(|e| AppError::unauthorized(e.to_string()))?;

        // The stored role wins over the claim; deleted accounts lose access immediately
        let user = match app_state.user_service.get_user(&claims.user_id()).await {
            Ok(user) => user,
            Err(Error::NotFound(_)) => return Err(AppError::unauthorized("Authentication failed")),
            Err(e) => return Err(e.into()),
        };
        if user.is_deleted() {
            return Err(AppError::unauthorized("Authentication failed"));
        }

        Ok(Self {
            user_id: user.id,
            role: user.role,
        })
    }
}

/// [`AuthUser`] that must hold the creator role
#[derive(Debug, Clone)]
pub struct CreatorUser(pub AuthUser);

impl<S> FromRequestParts<S> for CreatorUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.is_creator() {
            return Err(AppError::forbidden("Creator account required"));
        }
        Ok(Self(user))
    }
}

const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "content-security-policy",
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'",
    ),
];

/// Add security headers unless the handler already set them.
///
/// Responses are marked `no-store` since most carry account or review data.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in SECURITY_HEADERS {
        let name = HeaderName::from_static(name);
        if !headers.contains_key(&name) {
            headers.insert(name, HeaderValue::from_static(value));
        }
    }
    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    response
}

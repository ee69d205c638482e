// Authentication HTTP handlers

use axum::{extract::State, http::StatusCode, Json};
use reelgate_core::{
    models::{User, UserRole},
    service::TokenPair,
};
use serde::{Deserialize, Serialize};

use super::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Signed-in user with a fresh token pair
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (user, tokens) = state
        .user_service
        .register(req.username, req.password, req.email, req.role)
        .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse { user, tokens })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (user, tokens) = state
        .user_service
        .login(&req.username, &req.password)
        .await?;

    Ok(Json(AuthResponse { user, tokens }))
}

/// Refresh tokens are not rotated server-side; the old one stays valid until it expires
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> AppResult<Json<TokenPair>> {
    Ok(Json(state.user_service.refresh(&req.refresh_token).await?))
}

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use reelgate_core::{
    bootstrap::services::build_services,
    models::{UserId, UserRole},
    service::{JwtService, TokenType, VideoStorage, YouTubePublisher},
    Config,
};
use tower::ServiceExt;

use super::*;

const SECRET: &str = "router-test-secret-router-test-secret";

/// Router over a pool that never connects; only paths that fail before the database are exercised
fn test_router() -> (Router, JwtService) {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgresql://localhost/unused")
        .unwrap();
    router_over(pool)
}

fn router_over(pool: sqlx::PgPool) -> (Router, JwtService) {
    let mut config = Config::default();
    config.jwt.secret = SECRET.to_string();

    let publisher = Arc::new(YouTubePublisher::new(&config.youtube).unwrap());
    let services = build_services(
        pool,
        &config,
        VideoStorage::memory().unwrap(),
        publisher,
    )
    .unwrap();

    let jwt = services.jwt_service.clone();
    let router = create_router(AppState::new(&services, &config), &config.server);
    (router, jwt)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (router, _) = test_router();

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (router, _) = test_router();

    let response = router
        .oneshot(Request::get("/api/rooms").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["status"], 401);
    assert_eq!(body["error"], "Missing Authorization header");
}

#[tokio::test]
async fn test_malformed_and_wrong_type_tokens_are_rejected() {
    let (router, jwt) = test_router();
    let refresh = jwt
        .sign_token(&UserId::new(), UserRole::Creator, TokenType::Refresh)
        .unwrap();

    for value in [
        "Basic dXNlcjpwYXNz".to_string(),
        "Bearer not.a.jwt".to_string(),
        format!("Bearer {refresh}"),
    ] {
        let response = router
            .clone()
            .oneshot(
                Request::get("/api/videos/abc")
                    .header(header::AUTHORIZATION, value.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{value}");
    }
}

#[tokio::test]
async fn test_token_from_another_key_is_rejected() {
    let (router, _) = test_router();
    let foreign = JwtService::from_secret(b"some-other-deployment-secret-value")
        .sign_token(&UserId::new(), UserRole::Creator, TokenType::Access)
        .unwrap();

    let response = router
        .oneshot(
            Request::get("/api/user/me")
                .header(header::AUTHORIZATION, format!("Bearer {foreign}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let (router, _) = test_router();

    let response = router
        .oneshot(
            Request::post("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"username":"maya","password":"short","role":"creator"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Password"));
}

#[tokio::test]
async fn test_register_rejects_unknown_role() {
    let (router, _) = test_router();

    let response = router
        .oneshot(
            Request::post("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"username":"maya","password":"long enough","role":"admin"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_invite_token_is_not_found() {
    let (router, _) = test_router();

    let response = router
        .oneshot(Request::get("/api/invites/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_callback_without_code_is_bad_request() {
    let (router, _) = test_router();

    let response = router
        .oneshot(
            Request::get("/api/youtube/callback?error=access_denied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("access_denied"));
}

#[test]
fn test_upload_limit_adds_framing_headroom() {
    let server = ServerConfig {
        max_upload_mb: 1,
        ..ServerConfig::default()
    };
    assert_eq!(upload_limit(&server), 1024 * 1024 + 64 * 1024);
}

#[tokio::test]
async fn test_database_outage_is_not_reported_as_bad_token() {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(500))
        .connect_lazy("postgresql://reelgate@127.0.0.1:1/unreachable")
        .unwrap();
    let (router, jwt) = router_over(pool);
    let token = jwt
        .sign_token(&UserId::new(), UserRole::Creator, TokenType::Access)
        .unwrap();

    let response = router
        .oneshot(
            Request::get("/api/user/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Database error");
}

// Module: http
// JSON REST API for the review workflow

pub mod auth;
pub mod error;
pub mod health;
pub mod invite;
pub mod middleware;
pub mod room;
pub mod user;
pub mod video;
pub mod youtube;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use reelgate_core::{
    bootstrap::Services,
    config::ServerConfig,
    service::{InviteService, JwtValidator, RoomService, UserService, VideoService, YouTubeAccountService},
    Config,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub room_service: RoomService,
    pub invite_service: InviteService,
    pub video_service: VideoService,
    pub youtube_service: YouTubeAccountService,
    pub jwt_validator: Arc<JwtValidator>,
    /// Browser destination after the YouTube OAuth callback; JSON is returned when unset
    pub post_connect_redirect: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn new(services: &Services, config: &Config) -> Self {
        Self {
            user_service: services.user_service.clone(),
            room_service: services.room_service.clone(),
            invite_service: services.invite_service.clone(),
            video_service: services.video_service.clone(),
            youtube_service: services.youtube_service.clone(),
            jwt_validator: Arc::new(JwtValidator::new(Arc::new(services.jwt_service.clone()))),
            post_connect_redirect: config.youtube.post_connect_redirect.clone(),
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .merge(health::create_health_router())
        // Authentication routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh_token))
        .route("/api/user/me", get(user::get_me))
        // Rooms and membership
        .route("/api/rooms", get(room::list_rooms).post(room::create_room))
        .route("/api/rooms/{room_id}", get(room::get_room).delete(room::delete_room))
        .route("/api/rooms/{room_id}/members", get(room::list_members))
        .route(
            "/api/rooms/{room_id}/members/{user_id}",
            delete(room::remove_member),
        )
        .route("/api/rooms/{room_id}/leave", post(room::leave_room))
        // Invites
        .route(
            "/api/rooms/{room_id}/invites",
            get(invite::list_invites).post(invite::create_invite),
        )
        .route(
            "/api/rooms/{room_id}/invites/{invite_id}",
            delete(invite::revoke_invite),
        )
        .route("/api/invites/{token}", get(invite::resolve_invite))
        .route("/api/invites/{token}/redeem", post(invite::redeem_invite))
        // Videos
        .route(
            "/api/rooms/{room_id}/videos",
            get(video::list_videos)
                .post(video::upload_video)
                .layer(DefaultBodyLimit::max(upload_limit(server))),
        )
        .route(
            "/api/videos/{video_id}",
            get(video::get_video).delete(video::delete_video),
        )
        .route("/api/videos/{video_id}/content", get(video::download_video))
        .route("/api/videos/{video_id}/approve", post(video::approve_video))
        .route("/api/videos/{video_id}/reject", post(video::reject_video))
        .route("/api/videos/{video_id}/publish", post(video::publish_video))
        // YouTube channel linking
        .route("/api/youtube/connect", get(youtube::connect))
        .route("/api/youtube/callback", get(youtube::callback))
        .route(
            "/api/youtube/account",
            get(youtube::get_account).delete(youtube::disconnect),
        )
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Multipart framing on top of the configured file size
fn upload_limit(server: &ServerConfig) -> usize {
    server
        .max_upload_mb
        .saturating_mul(1024 * 1024)
        .saturating_add(64 * 1024)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

#[cfg(test)]
mod tests;

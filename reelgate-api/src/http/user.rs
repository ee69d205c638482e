// Current-user HTTP handlers

use axum::{extract::State, Json};
use reelgate_core::models::{User, YouTubeAccount};
use serde::Serialize;

use super::{middleware::AuthUser, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    /// Linked channel; always `null` for editors
    pub youtube: Option<YouTubeAccount>,
}

pub async fn get_me(auth: AuthUser, State(state): State<AppState>) -> AppResult<Json<MeResponse>> {
    let user = state.user_service.get_user(&auth.user_id).await?;
    let youtube = if user.role.is_creator() {
        state.youtube_service.status(&user.id).await?
    } else {
        None
    };

    Ok(Json(MeResponse { user, youtube }))
}

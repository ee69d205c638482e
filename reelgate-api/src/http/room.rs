// Room and membership HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use reelgate_core::models::{Room, RoomAccess, RoomId, RoomMemberWithUser, RoomWithCount, UserId};
use serde::{Deserialize, Serialize};

use super::{
    middleware::{AuthUser, CreatorUser},
    AppResult, AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    #[serde(flatten)]
    pub room: Room,
    /// `owner` or `member`, from the caller's point of view
    pub access: &'static str,
}

impl RoomResponse {
    const fn new(room: Room, access: RoomAccess) -> Self {
        Self {
            room,
            access: match access {
                RoomAccess::Owner => "owner",
                RoomAccess::Member => "member",
            },
        }
    }
}

pub async fn list_rooms(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<RoomWithCount>>> {
    Ok(Json(state.room_service.list_rooms_for(&auth.actor()).await?))
}

pub async fn create_room(
    CreatorUser(auth): CreatorUser,
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> AppResult<(StatusCode, Json<RoomResponse>)> {
    let room = state
        .room_service
        .create_room(&auth.actor(), &req.name, req.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(RoomResponse::new(room, RoomAccess::Owner))))
}

pub async fn get_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<RoomResponse>> {
    let (room, access) = state
        .room_service
        .get_room(&RoomId::from_string(room_id), &auth.actor())
        .await?;

    Ok(Json(RoomResponse::new(room, access)))
}

pub async fn delete_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .room_service
        .delete_room(&RoomId::from_string(room_id), &auth.actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<Vec<RoomMemberWithUser>>> {
    let members = state
        .room_service
        .list_members(&RoomId::from_string(room_id), &auth.actor())
        .await?;
    Ok(Json(members))
}

pub async fn remove_member(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .room_service
        .remove_member(
            &RoomId::from_string(room_id),
            &auth.actor(),
            &UserId::from_string(user_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .room_service
        .leave_room(&RoomId::from_string(room_id), &auth.actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

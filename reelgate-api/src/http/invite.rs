// Invite HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use reelgate_core::{
    models::{InviteId, Room, RoomId, RoomMember},
    service::{InvitePreview, InviteWithLink},
};
use serde::{Deserialize, Serialize};

use super::{middleware::AuthUser, AppResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct CreateInviteRequest {
    pub ttl_hours: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub room: Room,
    pub membership: RoomMember,
}

pub async fn create_invite(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<CreateInviteRequest>,
) -> AppResult<(StatusCode, Json<InviteWithLink>)> {
    let invite = state
        .invite_service
        .create_invite(&RoomId::from_string(room_id), &auth.actor(), req.ttl_hours, req.note)
        .await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

pub async fn list_invites(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<Vec<InviteWithLink>>> {
    let invites = state
        .invite_service
        .list_invites(&RoomId::from_string(room_id), &auth.actor())
        .await?;
    Ok(Json(invites))
}

pub async fn revoke_invite(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((room_id, invite_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .invite_service
        .revoke_invite(
            &RoomId::from_string(room_id),
            &InviteId::from_string(invite_id),
            &auth.actor(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public: lets the join page show where a link leads before sign-in
pub async fn resolve_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<InvitePreview>> {
    Ok(Json(state.invite_service.resolve(&token).await?))
}

pub async fn redeem_invite(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<RedeemResponse>> {
    let (room, membership) = state.invite_service.redeem(&token, &auth.actor()).await?;
    Ok(Json(RedeemResponse { room, membership }))
}

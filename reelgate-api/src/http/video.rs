// Video upload, review and publishing HTTP handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use reelgate_core::{
    models::{ApproveVideo, NewVideo, PrivacyStatus, RoomId, Video, VideoId, VideoStatus},
    service::storage::sanitize_file_name,
};
use serde::{Deserialize, Serialize};

use super::{middleware::AuthUser, AppError, AppResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListVideosQuery {
    pub status: Option<VideoStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub note: Option<String>,
}

/// Video plus its public YouTube link once uploaded
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    #[serde(flatten)]
    pub video: Video,
    pub youtube_url: Option<String>,
}

impl From<Video> for VideoResponse {
    fn from(video: Video) -> Self {
        Self {
            youtube_url: video.youtube_url(),
            video,
        }
    }
}

pub async fn list_videos(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<ListVideosQuery>,
) -> AppResult<Json<Vec<VideoResponse>>> {
    let videos = state
        .video_service
        .list(&RoomId::from_string(room_id), &auth.actor(), query.status)
        .await?;
    Ok(Json(videos.into_iter().map(VideoResponse::from).collect()))
}

/// `multipart/form-data` with `title`, `description`, `tags`, `privacy` and `file`
pub async fn upload_video(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<VideoResponse>)> {
    let new = read_upload(multipart).await?;
    let video = state
        .video_service
        .upload(&RoomId::from_string(room_id), &auth.actor(), new)
        .await?;
    Ok((StatusCode::CREATED, Json(video.into())))
}

async fn read_upload(mut multipart: Multipart) -> AppResult<NewVideo> {
    let mut title = None;
    let mut description = String::new();
    let mut tags = Vec::new();
    let mut privacy = None;
    let mut file: Option<(String, String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(field.text().await?),
            "description" => description = field.text().await?,
            "tags" => tags = split_tags(&field.text().await?),
            "privacy" => {
                let value = field.text().await?;
                if !value.trim().is_empty() {
                    privacy = Some(
                        value
                            .trim()
                            .parse::<PrivacyStatus>()
                            .map_err(AppError::bad_request)?,
                    );
                }
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("video").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                file = Some((file_name, content_type, bytes));
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown upload field");
            }
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| AppError::bad_request("Missing 'file' field"))?;
    let title = title.ok_or_else(|| AppError::bad_request("Missing 'title' field"))?;

    Ok(NewVideo {
        title,
        description,
        tags,
        file_name,
        content_type,
        privacy,
        bytes,
    })
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn get_video(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<VideoResponse>> {
    let video = state
        .video_service
        .get(&VideoId::from_string(video_id), &auth.actor())
        .await?;
    Ok(Json(video.into()))
}

pub async fn download_video(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Response> {
    let (video, bytes) = state
        .video_service
        .content(&VideoId::from_string(video_id), &auth.actor())
        .await?;

    let content_type = HeaderValue::from_str(&video.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        sanitize_file_name(&video.file_name)
    ))
    .map_err(|e| AppError::internal_server_error(format!("Invalid file name header: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub async fn approve_video(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    body: Option<Json<ApproveVideo>>,
) -> AppResult<Json<VideoResponse>> {
    let approval = body.map(|Json(b)| b).unwrap_or_default();
    let video = state
        .video_service
        .approve(&VideoId::from_string(video_id), &auth.actor(), approval)
        .await?;
    Ok(Json(video.into()))
}

pub async fn reject_video(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> AppResult<Json<VideoResponse>> {
    let note = body.and_then(|Json(b)| b.note);
    let video = state
        .video_service
        .reject(&VideoId::from_string(video_id), &auth.actor(), note)
        .await?;
    Ok(Json(video.into()))
}

/// Returns 202: the video is `processing` and the upload continues in the background
pub async fn publish_video(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<(StatusCode, Json<VideoResponse>)> {
    let video = state
        .video_service
        .publish(&VideoId::from_string(video_id), &auth.actor())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(video.into())))
}

pub async fn delete_video(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .video_service
        .delete(&VideoId::from_string(video_id), &auth.actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags(" vlog, travel ,,japan "), vec!["vlog", "travel", "japan"]);
        assert!(split_tags("  ").is_empty());
    }
}

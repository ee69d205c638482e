use std::str::FromStr;

use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{PrivacyStatus, RoomId, UserId, Video, VideoId, VideoStatus},
    Error, Result,
};

const VIDEO_COLUMNS: &str = "id, room_id, uploaded_by, title, description, tags, storage_key, \
     file_name, content_type, size_bytes, status, review_note, reviewed_by, reviewed_at, \
     privacy, youtube_video_id, publish_error, publish_attempts, published_at, created_at, updated_at";

/// Metadata applied when a creator reviews a video
#[derive(Debug, Clone, Default)]
pub struct ReviewUpdate {
    pub reviewer: Option<UserId>,
    pub note: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub privacy: Option<PrivacyStatus>,
}

/// Video repository
///
/// Every status change goes through a compare-and-set on the current status:
/// the `WHERE` clause only matches rows whose status is a legal predecessor of
/// the target, and a `None` result means the transition lost a race or was
/// never legal.
#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, video: &Video) -> Result<Video> {
        let row = sqlx::query(&format!(
            "INSERT INTO videos (
                id, room_id, uploaded_by, title, description, tags, storage_key,
                file_name, content_type, size_bytes, status, privacy, created_at, updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(video.id.as_str())
        .bind(video.room_id.as_str())
        .bind(video.uploaded_by.as_str())
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.tags)
        .bind(&video.storage_key)
        .bind(&video.file_name)
        .bind(&video.content_type)
        .bind(video.size_bytes)
        .bind(video.status.as_str())
        .bind(video.privacy.as_str())
        .bind(video.created_at)
        .bind(video.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_video(&row)
    }

    pub async fn get_by_id(&self, video_id: &VideoId) -> Result<Option<Video>> {
        let row = sqlx::query(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"))
            .bind(video_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_video).transpose()
    }

    /// Videos in a room, newest first, optionally filtered by status
    pub async fn list_by_room(
        &self,
        room_id: &RoomId,
        status: Option<VideoStatus>,
    ) -> Result<Vec<Video>> {
        let rows = sqlx::query(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
             WHERE room_id = $1 AND ($2::TEXT IS NULL OR status = $2)
             ORDER BY created_at DESC"
        ))
        .bind(room_id.as_str())
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_video).collect()
    }

    /// Move a pending video to `approved` or `rejected`
    pub async fn review(
        &self,
        video_id: &VideoId,
        next: VideoStatus,
        update: &ReviewUpdate,
    ) -> Result<Option<Video>> {
        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = $3,
                 reviewed_by = $4,
                 review_note = $5,
                 title = COALESCE($6, title),
                 description = COALESCE($7, description),
                 privacy = COALESCE($8, privacy),
                 reviewed_at = NOW(),
                 updated_at = NOW()
             WHERE id = $1 AND status = ANY($2)
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(video_id.as_str())
        .bind(Self::sources(next))
        .bind(next.as_str())
        .bind(update.reviewer.as_ref().map(UserId::as_str))
        .bind(update.note.as_ref())
        .bind(update.title.as_ref())
        .bind(update.description.as_ref())
        .bind(update.privacy.map(|p| p.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_video).transpose()
    }

    /// Claim a video for upload by moving it to `processing`
    pub async fn begin_publish(&self, video_id: &VideoId) -> Result<Option<Video>> {
        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = $3,
                 publish_error = NULL,
                 publish_attempts = publish_attempts + 1,
                 updated_at = NOW()
             WHERE id = $1 AND status = ANY($2)
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(video_id.as_str())
        .bind(Self::sources(VideoStatus::Processing))
        .bind(VideoStatus::Processing.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_video).transpose()
    }

    /// Record a successful upload
    pub async fn complete_publish(
        &self,
        video_id: &VideoId,
        youtube_video_id: &str,
    ) -> Result<Option<Video>> {
        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = $3,
                 youtube_video_id = $4,
                 publish_error = NULL,
                 published_at = NOW(),
                 updated_at = NOW()
             WHERE id = $1 AND status = ANY($2)
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(video_id.as_str())
        .bind(Self::sources(VideoStatus::Uploaded))
        .bind(VideoStatus::Uploaded.as_str())
        .bind(youtube_video_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_video).transpose()
    }

    /// Record a failed upload so it can be retried
    pub async fn fail_publish(&self, video_id: &VideoId, error: &str) -> Result<Option<Video>> {
        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = $3,
                 publish_error = $4,
                 updated_at = NOW()
             WHERE id = $1 AND status = ANY($2)
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(video_id.as_str())
        .bind(Self::sources(VideoStatus::UploadFailed))
        .bind(VideoStatus::UploadFailed.as_str())
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_video).transpose()
    }

    /// Move every video left in `processing` to `upload_failed`.
    ///
    /// Only valid while no publish task is running, i.e. at startup.
    pub async fn fail_interrupted_publishes(&self, error: &str) -> Result<Vec<VideoId>> {
        let rows = sqlx::query(
            "UPDATE videos
             SET status = $2,
                 publish_error = $3,
                 updated_at = NOW()
             WHERE status = $1
             RETURNING id",
        )
        .bind(VideoStatus::Processing.as_str())
        .bind(VideoStatus::UploadFailed.as_str())
        .bind(error)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok(VideoId::from_string(row.try_get("id")?)))
            .collect()
    }

    /// Delete a video if its status is still one of `allowed`.
    /// Returns the removed row so the caller can clean up storage.
    pub async fn delete_if_status(
        &self,
        video_id: &VideoId,
        allowed: &[VideoStatus],
    ) -> Result<Option<Video>> {
        let allowed: Vec<&str> = allowed.iter().map(VideoStatus::as_str).collect();
        let row = sqlx::query(&format!(
            "DELETE FROM videos WHERE id = $1 AND status = ANY($2) RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(video_id.as_str())
        .bind(allowed)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_video).transpose()
    }

    fn sources(next: VideoStatus) -> Vec<&'static str> {
        VideoStatus::sources_of(next)
            .iter()
            .map(VideoStatus::as_str)
            .collect()
    }

    fn row_to_video(row: &PgRow) -> Result<Video> {
        let status: String = row.try_get("status")?;
        let privacy: String = row.try_get("privacy")?;

        Ok(Video {
            id: VideoId::from_string(row.try_get("id")?),
            room_id: RoomId::from_string(row.try_get("room_id")?),
            uploaded_by: UserId::from_string(row.try_get("uploaded_by")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            tags: row.try_get("tags")?,
            storage_key: row.try_get("storage_key")?,
            file_name: row.try_get("file_name")?,
            content_type: row.try_get("content_type")?,
            size_bytes: row.try_get("size_bytes")?,
            status: VideoStatus::from_str(&status).map_err(Error::Internal)?,
            review_note: row.try_get("review_note")?,
            reviewed_by: row
                .try_get::<Option<String>, _>("reviewed_by")?
                .map(UserId::from_string),
            reviewed_at: row.try_get("reviewed_at")?,
            privacy: PrivacyStatus::from_str(&privacy).map_err(Error::Internal)?,
            youtube_video_id: row.try_get("youtube_video_id")?,
            publish_error: row.try_get("publish_error")?,
            publish_attempts: row.try_get("publish_attempts")?,
            published_at: row.try_get("published_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

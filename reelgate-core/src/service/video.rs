use bytes::Bytes;
use chrono::Utc;
use sqlx::PgPool;

use crate::{
    models::{
        Actor, ApproveVideo, NewVideo, PrivacyStatus, RoomAccess, RoomId, Video, VideoId,
        VideoStatus,
    },
    repository::{ReviewUpdate, VideoRepository},
    service::{
        publish::PublishService,
        storage::{video_key, VideoStorage},
        RoomService,
    },
    Error, Result,
};

pub const MAX_TITLE_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 5000;
const MAX_TAG_LENGTH: usize = 100;
const MAX_TAGS: usize = 50;
const MAX_NOTE_LENGTH: usize = 2000;

/// Upload, review and lifecycle of videos inside rooms
#[derive(Clone)]
pub struct VideoService {
    repo: VideoRepository,
    rooms: RoomService,
    storage: VideoStorage,
    publishing: PublishService,
    default_privacy: PrivacyStatus,
    auto_publish: bool,
}

impl std::fmt::Debug for VideoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoService")
            .field("auto_publish", &self.auto_publish)
            .finish_non_exhaustive()
    }
}

impl VideoService {
    #[must_use]
    pub fn new(
        pool: PgPool,
        rooms: RoomService,
        storage: VideoStorage,
        publishing: PublishService,
        default_privacy: PrivacyStatus,
        auto_publish: bool,
    ) -> Self {
        Self {
            repo: VideoRepository::new(pool),
            rooms,
            storage,
            publishing,
            default_privacy,
            auto_publish,
        }
    }

    /// Store an editor's (or the owner's) upload as a `pending` video
    pub async fn upload(&self, room_id: &RoomId, actor: &Actor, new: NewVideo) -> Result<Video> {
        let title = validate_title(&new.title)?;
        let description = validate_description(&new.description)?;
        let tags = normalize_tags(new.tags)?;
        if !new.content_type.to_ascii_lowercase().starts_with("video/") {
            return Err(Error::InvalidInput(format!(
                "Unsupported content type {}; expected a video",
                new.content_type
            )));
        }
        if new.bytes.is_empty() {
            return Err(Error::InvalidInput("Uploaded file is empty".to_string()));
        }
        let size_bytes = i64::try_from(new.bytes.len())
            .map_err(|_| Error::InvalidInput("Uploaded file is too large".to_string()))?;

        self.rooms.access(room_id, &actor.user_id).await?;

        let now = Utc::now();
        let id = VideoId::new();
        let storage_key = video_key(room_id, &id, &new.file_name);
        let video = Video {
            id,
            room_id: room_id.clone(),
            uploaded_by: actor.user_id.clone(),
            title,
            description,
            tags,
            storage_key,
            file_name: new.file_name,
            content_type: new.content_type,
            size_bytes,
            status: VideoStatus::Pending,
            review_note: None,
            reviewed_by: None,
            reviewed_at: None,
            privacy: new.privacy.unwrap_or(self.default_privacy),
            youtube_video_id: None,
            publish_error: None,
            publish_attempts: 0,
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        self.storage.put(&video.storage_key, new.bytes).await?;

        let video = match self.repo.create(&video).await {
            Ok(created) => created,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&video.storage_key).await {
                    tracing::warn!(key = %video.storage_key, error = %cleanup, "Orphaned video file");
                }
                return Err(e);
            }
        };

        tracing::info!(
            video_id = %video.id,
            room_id = %video.room_id,
            uploaded_by = %video.uploaded_by,
            size_bytes = video.size_bytes,
            to = %VideoStatus::Pending,
            "Video uploaded"
        );
        Ok(video)
    }

    pub async fn list(
        &self,
        room_id: &RoomId,
        actor: &Actor,
        status: Option<VideoStatus>,
    ) -> Result<Vec<Video>> {
        self.rooms.access(room_id, &actor.user_id).await?;
        self.repo.list_by_room(room_id, status).await
    }

    pub async fn get(&self, video_id: &VideoId, actor: &Actor) -> Result<Video> {
        Ok(self.load(video_id, actor).await?.0)
    }

    /// Video metadata together with the stored file
    pub async fn content(&self, video_id: &VideoId, actor: &Actor) -> Result<(Video, Bytes)> {
        let (video, _) = self.load(video_id, actor).await?;
        let bytes = self.storage.get(&video.storage_key).await?;
        Ok((video, bytes))
    }

    /// `pending -> approved`, then hand off to publishing when enabled
    pub async fn approve(
        &self,
        video_id: &VideoId,
        actor: &Actor,
        approval: ApproveVideo,
    ) -> Result<Video> {
        let video = self.load_for_review(video_id, actor).await?;
        let update = ReviewUpdate {
            reviewer: Some(actor.user_id.clone()),
            note: validate_note(approval.note)?,
            title: approval.title.as_deref().map(validate_title).transpose()?,
            description: approval
                .description
                .as_deref()
                .map(validate_description)
                .transpose()?,
            privacy: approval.privacy,
        };

        let video = self.review(&video, VideoStatus::Approved, &update).await?;

        if !self.auto_publish {
            return Ok(video);
        }
        match self.publishing.start(&video.id).await {
            Ok(processing) => Ok(processing),
            Err(e) => {
                // Approval stands; the owner can retry publishing
                tracing::warn!(video_id = %video.id, error = %e, "Auto-publish did not start");
                Ok(video)
            }
        }
    }

    /// `pending -> rejected`
    pub async fn reject(
        &self,
        video_id: &VideoId,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<Video> {
        let video = self.load_for_review(video_id, actor).await?;
        let update = ReviewUpdate {
            reviewer: Some(actor.user_id.clone()),
            note: validate_note(note)?,
            ..ReviewUpdate::default()
        };
        self.review(&video, VideoStatus::Rejected, &update).await
    }

    /// Manual publish, or retry after `upload_failed`
    pub async fn publish(&self, video_id: &VideoId, actor: &Actor) -> Result<Video> {
        let (video, access) = self.load(video_id, actor).await?;
        if !access.is_owner() {
            return Err(Error::Authorization(
                "Only the room owner can publish videos".to_string(),
            ));
        }
        if !video.status.is_publishable() {
            return Err(transition_conflict(video.status, "publishing"));
        }
        self.publishing.start(video_id).await
    }

    /// Owners may delete anything not mid-upload; uploaders only what has not been approved
    pub async fn delete(&self, video_id: &VideoId, actor: &Actor) -> Result<()> {
        let (video, access) = self.load(video_id, actor).await?;
        let allowed = deletable_statuses(access, video.uploaded_by == actor.user_id);
        if allowed.is_empty() {
            return Err(Error::Authorization(
                "Only the room owner or the uploader can delete this video".to_string(),
            ));
        }
        if !allowed.contains(&video.status) {
            return Err(transition_conflict(video.status, "deletion"));
        }

        let Some(deleted) = self.repo.delete_if_status(video_id, allowed).await? else {
            return Err(Error::Conflict(
                "Video changed state while it was being deleted".to_string(),
            ));
        };

        if let Err(e) = self.storage.delete(&deleted.storage_key).await {
            tracing::warn!(key = %deleted.storage_key, error = %e, "Failed to delete video file");
        }
        tracing::info!(video_id = %deleted.id, room_id = %deleted.room_id, status = %deleted.status, "Video deleted");
        Ok(())
    }

    async fn load_for_review(&self, video_id: &VideoId, actor: &Actor) -> Result<Video> {
        let (video, access) = self.load(video_id, actor).await?;
        if !access.is_owner() {
            return Err(Error::Authorization(
                "Only the room owner can review videos".to_string(),
            ));
        }
        Ok(video)
    }

    async fn review(
        &self,
        video: &Video,
        next: VideoStatus,
        update: &ReviewUpdate,
    ) -> Result<Video> {
        let Some(updated) = self.repo.review(&video.id, next, update).await? else {
            // Re-read so the message names the status that won
            let current = self
                .repo
                .get_by_id(&video.id)
                .await?
                .map_or(video.status, |v| v.status);
            let action = match next {
                VideoStatus::Approved => "approval",
                _ => "rejection",
            };
            return Err(transition_conflict(current, action));
        };

        tracing::info!(
            video_id = %updated.id,
            room_id = %updated.room_id,
            from = %video.status,
            to = %next,
            "Video reviewed"
        );
        Ok(updated)
    }

    async fn load(&self, video_id: &VideoId, actor: &Actor) -> Result<(Video, RoomAccess)> {
        let video = self
            .repo
            .get_by_id(video_id)
            .await?
            .ok_or_else(|| Error::NotFound("Video not found".to_string()))?;
        let (_, access) = self.rooms.access(&video.room_id, &actor.user_id).await?;
        Ok((video, access))
    }
}

fn transition_conflict(current: VideoStatus, action: &str) -> Error {
    Error::Conflict(format!(
        "Video is not in a state that allows {action} (status: {current})"
    ))
}

/// Statuses from which `actor` may delete a video
fn deletable_statuses(access: RoomAccess, is_uploader: bool) -> &'static [VideoStatus] {
    const OWNER: &[VideoStatus] = &[
        VideoStatus::Pending,
        VideoStatus::Approved,
        VideoStatus::Rejected,
        VideoStatus::Uploaded,
        VideoStatus::UploadFailed,
    ];
    const UPLOADER: &[VideoStatus] = &[VideoStatus::Pending, VideoStatus::Rejected];

    match access {
        RoomAccess::Owner => OWNER,
        RoomAccess::Member if is_uploader => UPLOADER,
        RoomAccess::Member => &[],
    }
}

/// YouTube rejects titles and descriptions containing angle brackets
fn has_angle_brackets(s: &str) -> bool {
    s.contains(['<', '>'])
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("Title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    if has_angle_brackets(title) {
        return Err(Error::InvalidInput("Title cannot contain '<' or '>'".to_string()));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<String> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Description must be at most {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    if has_angle_brackets(description) {
        return Err(Error::InvalidInput(
            "Description cannot contain '<' or '>'".to_string(),
        ));
    }
    Ok(description.to_string())
}

fn validate_note(note: Option<String>) -> Result<Option<String>> {
    let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LENGTH) {
        return Err(Error::InvalidInput(format!(
            "Review note must be at most {MAX_NOTE_LENGTH} characters"
        )));
    }
    Ok(note)
}

/// Trim, drop blanks and duplicates, keep first-seen order
fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Tags must be at most {MAX_TAG_LENGTH} characters"
            )));
        }
        out.push(tag.to_string());
    }
    if out.len() > MAX_TAGS {
        return Err(Error::InvalidInput(format!("At most {MAX_TAGS} tags are allowed")));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Cut 3 ").unwrap(), "Cut 3");
        assert!(validate_title("").is_err());
        assert!(validate_title(&"t".repeat(MAX_TITLE_LENGTH)).is_ok());
        assert!(validate_title(&"t".repeat(MAX_TITLE_LENGTH + 1)).is_err());
        assert!(validate_title("<script>").is_err());
    }

    #[test]
    fn test_validate_description() {
        assert_eq!(validate_description("").unwrap(), "");
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LENGTH)).is_ok());
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_note() {
        assert_eq!(validate_note(Some("   ".into())).unwrap(), None);
        assert_eq!(validate_note(Some(" ok ".into())).unwrap().as_deref(), Some("ok"));
        assert!(validate_note(Some("n".repeat(MAX_NOTE_LENGTH + 1))).is_err());
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![" vlog ".into(), "".into(), "Vlog".into(), "travel".into()];
        assert_eq!(normalize_tags(tags).unwrap(), vec!["vlog", "travel"]);
        assert!(normalize_tags(vec!["x".repeat(MAX_TAG_LENGTH + 1)]).is_err());
        let many: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{i}")).collect();
        assert!(normalize_tags(many).is_err());
    }

    #[test]
    fn test_deletable_statuses() {
        let owner = deletable_statuses(RoomAccess::Owner, false);
        assert!(!owner.contains(&VideoStatus::Processing));
        assert!(owner.contains(&VideoStatus::Uploaded));

        let uploader = deletable_statuses(RoomAccess::Member, true);
        assert_eq!(uploader, &[VideoStatus::Pending, VideoStatus::Rejected]);

        assert!(deletable_statuses(RoomAccess::Member, false).is_empty());
    }

    #[test]
    fn test_transition_conflict_message() {
        match transition_conflict(VideoStatus::Rejected, "approval") {
            Error::Conflict(msg) => {
                assert_eq!(msg, "Video is not in a state that allows approval (status: rejected)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

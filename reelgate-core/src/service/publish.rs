//! Drives an approved video through `processing` to `uploaded` or `upload_failed`

use std::{sync::Arc, time::Duration};

use sqlx::PgPool;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::{
    config::YouTubeConfig,
    models::{Video, VideoId, VideoStatus},
    repository::{RoomRepository, VideoRepository},
    service::{
        storage::VideoStorage,
        youtube::{PublishRequest, VideoPublisher, YouTubeAccountService},
    },
    Error, Result,
};

/// `publish_error` recorded for uploads cut off by a restart
pub const INTERRUPTED_MESSAGE: &str = "Publishing was interrupted";

#[derive(Clone)]
pub struct PublishService {
    videos: VideoRepository,
    rooms: RoomRepository,
    storage: VideoStorage,
    accounts: YouTubeAccountService,
    publisher: Arc<dyn VideoPublisher>,
    category_id: String,
    tasks: TaskTracker,
}

impl std::fmt::Debug for PublishService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishService")
            .field("category_id", &self.category_id)
            .field("running", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl PublishService {
    #[must_use]
    pub fn new(
        pool: PgPool,
        storage: VideoStorage,
        accounts: YouTubeAccountService,
        publisher: Arc<dyn VideoPublisher>,
        config: &YouTubeConfig,
    ) -> Self {
        Self {
            videos: VideoRepository::new(pool.clone()),
            rooms: RoomRepository::new(pool),
            storage,
            accounts,
            publisher,
            category_id: config.category_id.clone(),
            tasks: TaskTracker::new(),
        }
    }

    /// Claim and upload a video, waiting for the outcome.
    ///
    /// Upload problems are recorded on the video as `upload_failed` and the
    /// failed video is returned; only bookkeeping failures come back as `Err`.
    pub async fn publish(&self, video_id: &VideoId) -> Result<Video> {
        let video = self.claim(video_id).await?;
        self.upload(video).await
    }

    /// Claim a video now and upload it on a tracked background task.
    ///
    /// Returns the video in `processing` so callers see the claim succeed or
    /// fail synchronously.
    pub async fn start(&self, video_id: &VideoId) -> Result<Video> {
        let video = self.claim(video_id).await?;
        let claimed = video.clone();
        let this = self.clone();
        let span = tracing::info_span!("publish", video_id = %video.id, room_id = %video.room_id);

        self.tasks.spawn(
            async move {
                if let Err(e) = this.upload(video).await {
                    tracing::error!(error = %e, "Publish bookkeeping failed");
                }
            }
            .instrument(span),
        );

        Ok(claimed)
    }

    /// Mark uploads cut off by a previous shutdown as failed so they can be retried.
    /// Must run before any publish task is started.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let recovered = self
            .videos
            .fail_interrupted_publishes(INTERRUPTED_MESSAGE)
            .await?;
        for video_id in &recovered {
            tracing::warn!(
                video_id = %video_id,
                from = %VideoStatus::Processing,
                to = %VideoStatus::UploadFailed,
                "Publish was interrupted"
            );
        }
        Ok(recovered.len())
    }

    /// Stop accepting publish tasks and wait for running ones.
    ///
    /// Returns `false` if `grace` elapsed first; those videos stay in
    /// `processing` until [`Self::recover_interrupted`] runs on next start.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tasks.close();
        let running = self.tasks.len();
        if running > 0 {
            tracing::info!(running, "Waiting for publish tasks");
        }
        tokio::time::timeout(grace, self.tasks.wait()).await.is_ok()
    }

    async fn claim(&self, video_id: &VideoId) -> Result<Video> {
        let Some(video) = self.videos.begin_publish(video_id).await? else {
            return Err(match self.videos.get_by_id(video_id).await? {
                None => Error::NotFound("Video not found".to_string()),
                Some(current) => Error::Conflict(format!(
                    "Video is not in a state that allows publishing (status: {})",
                    current.status
                )),
            });
        };

        tracing::info!(
            video_id = %video.id,
            room_id = %video.room_id,
            to = %VideoStatus::Processing,
            attempt = video.publish_attempts,
            "Video claimed for publishing"
        );
        Ok(video)
    }

    async fn upload(&self, video: Video) -> Result<Video> {
        let outcome = self.try_upload(&video).await;

        let updated = match outcome {
            Ok(youtube_id) => {
                let updated = self.videos.complete_publish(&video.id, &youtube_id).await?;
                tracing::info!(
                    video_id = %video.id,
                    room_id = %video.room_id,
                    from = %VideoStatus::Processing,
                    to = %VideoStatus::Uploaded,
                    youtube_video_id = %youtube_id,
                    "Video published"
                );
                updated
            }
            Err(e) => {
                let message = failure_message(&e);
                tracing::warn!(
                    video_id = %video.id,
                    room_id = %video.room_id,
                    from = %VideoStatus::Processing,
                    to = %VideoStatus::UploadFailed,
                    error = %e,
                    "Video publish failed"
                );
                self.videos.fail_publish(&video.id, &message).await?
            }
        };

        // Only this task moves a claimed video out of `processing`
        updated.ok_or_else(|| {
            Error::Conflict("Video left processing while it was being published".to_string())
        })
    }

    async fn try_upload(&self, video: &Video) -> Result<String> {
        let room = self
            .rooms
            .get_by_id(&video.room_id)
            .await?
            .ok_or_else(|| Error::NotFound("Room no longer exists".to_string()))?;

        let access_token = self.accounts.access_token(&room.owner_id).await?;
        let bytes = self.storage.get(&video.storage_key).await?;

        let request = PublishRequest {
            title: video.title.clone(),
            description: video.description.clone(),
            tags: video.tags.clone(),
            category_id: self.category_id.clone(),
            privacy: video.privacy,
            content_type: video.content_type.clone(),
            bytes,
        };

        Ok(self.publisher.publish(&access_token, &request).await?.video_id)
    }
}

/// Text stored in `publish_error`; shown to the creator, so server faults stay vague
fn failure_message(err: &Error) -> String {
    match err {
        Error::Authentication(msg)
        | Error::InvalidInput(msg)
        | Error::NotFound(msg)
        | Error::External(msg) => msg.clone(),
        Error::Storage(_) => "Stored video file could not be read".to_string(),
        _ => "Internal error while publishing".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message() {
        assert_eq!(
            failure_message(&Error::InvalidInput("YouTube account not connected".into())),
            "YouTube account not connected"
        );
        assert_eq!(
            failure_message(&Error::External("quota exceeded".into())),
            "quota exceeded"
        );
        assert_eq!(
            failure_message(&Error::Internal("db pool exhausted at 10.0.0.3".into())),
            "Internal error while publishing"
        );
    }
}

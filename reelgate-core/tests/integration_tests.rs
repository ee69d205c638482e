//! End-to-end workflow tests against a real Postgres database
//!
//! Run with:
//! REELGATE_TEST_DATABASE_URL=postgresql://... cargo test -p reelgate-core --test integration_tests -- --ignored

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use reelgate_core::{
    bootstrap::services::{build_services, Services},
    models::{Actor, ApproveVideo, NewVideo, RoomId, UserRole, VideoStatus, YouTubeAccount},
    repository::YouTubeAccountRepository,
    service::{
        publish::INTERRUPTED_MESSAGE, youtube::ChannelInfo, PublishRequest, PublishedVideo,
        VideoPublisher, VideoStorage,
    },
    Config, Error, Result,
};
use sqlx::PgPool;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The interrupted-publish sweep touches every `processing` row, so tests
/// that publish take turns
static PUBLISH_LOCK: Mutex<()> = Mutex::new(());

fn publish_lock() -> MutexGuard<'static, ()> {
    PUBLISH_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Records uploads instead of calling YouTube
#[derive(Default)]
struct FakePublisher {
    uploads: AtomicUsize,
    fail: bool,
    delay: Option<std::time::Duration>,
}

#[async_trait]
impl VideoPublisher for FakePublisher {
    async fn publish(&self, access_token: &str, request: &PublishRequest) -> Result<PublishedVideo> {
        assert_eq!(access_token, "ya29.test-token");
        assert!(!request.bytes.is_empty());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::External("quotaExceeded".to_string()));
        }
        Ok(PublishedVideo {
            video_id: "dQw4w9WgXcQ".to_string(),
        })
    }

    async fn fetch_channel(&self, _access_token: &str) -> Result<Option<ChannelInfo>> {
        Ok(None)
    }
}

async fn setup(publisher: Arc<FakePublisher>) -> Option<(PgPool, Services)> {
    setup_with(publisher, |_| {}).await
}

async fn setup_with(
    publisher: Arc<FakePublisher>,
    configure: impl FnOnce(&mut Config),
) -> Option<(PgPool, Services)> {
    let url = std::env::var("REELGATE_TEST_DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect test database");
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    let mut config = Config::default();
    config.jwt.secret = "integration-test-secret-integration-test".to_string();
    config.publishing.auto_publish_on_approve = false;
    configure(&mut config);

    let services = build_services(
        pool.clone(),
        &config,
        VideoStorage::memory().expect("memory storage"),
        publisher,
    )
    .expect("build services");
    Some((pool, services))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}{}", &nanoid::nanoid!(8).to_lowercase().replace(['-', '_'], "x"))
}

async fn register(services: &Services, role: UserRole) -> Actor {
    let (user, _) = services
        .user_service
        .register(unique("u"), "correct horse battery".to_string(), None, role)
        .await
        .expect("register");
    Actor::new(user.id, user.role)
}

fn sample_video() -> NewVideo {
    NewVideo {
        title: "Episode 12 rough cut".to_string(),
        description: "Second pass".to_string(),
        tags: vec!["vlog".to_string()],
        file_name: "ep12.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        privacy: None,
        bytes: Bytes::from_static(b"\x00\x00\x00\x18ftypmp42"),
    }
}

async fn connect_youtube(pool: &PgPool, owner: &Actor) {
    store_youtube_account(pool, owner, "ya29.test-token", None, Utc::now() + Duration::hours(1)).await;
}

async fn store_youtube_account(
    pool: &PgPool,
    owner: &Actor,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: DateTime<Utc>,
) {
    let now = Utc::now();
    YouTubeAccountRepository::new(pool.clone())
        .upsert(&YouTubeAccount {
            user_id: owner.user_id.clone(),
            channel_id: Some("UC123".to_string()),
            channel_title: Some("Test channel".to_string()),
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at,
            scope: String::new(),
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("store youtube account");
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_invite_is_single_use() {
    let Some((_, services)) = setup(Arc::default()).await else {
        return;
    };
    let creator = register(&services, UserRole::Creator).await;
    let editor = register(&services, UserRole::Editor).await;
    let other_editor = register(&services, UserRole::Editor).await;

    let room = services
        .room_service
        .create_room(&creator, "Channel edits", None)
        .await
        .unwrap();
    let invite = services
        .invite_service
        .create_invite(&room.id, &creator, None, None)
        .await
        .unwrap();

    let preview = services.invite_service.resolve(&invite.invite.token).await.unwrap();
    assert_eq!(preview.room_id, room.id);
    assert!(preview.availability.is_available());

    let (joined, member) = services
        .invite_service
        .redeem(&invite.invite.token, &editor)
        .await
        .unwrap();
    assert_eq!(joined.id, room.id);
    assert_eq!(member.user_id, editor.user_id);

    let err = services
        .invite_service
        .redeem(&invite.invite.token, &other_editor)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    // The first editor now sees the room, the second does not
    services.room_service.get_room(&room.id, &editor).await.unwrap();
    let err = services
        .room_service
        .get_room(&room.id, &other_editor)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_concurrent_redeem_admits_one_editor() {
    let Some((_, services)) = setup(Arc::default()).await else {
        return;
    };
    let creator = register(&services, UserRole::Creator).await;
    let room = services
        .room_service
        .create_room(&creator, "Race", None)
        .await
        .unwrap();
    let invite = services
        .invite_service
        .create_invite(&room.id, &creator, Some(1), None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let editor = register(&services, UserRole::Editor).await;
        let invites = services.invite_service.clone();
        let token = invite.invite.token.clone();
        handles.push(tokio::spawn(async move { invites.redeem(&token, &editor).await }));
    }

    let mut joined = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            joined += 1;
        }
    }
    assert_eq!(joined, 1);

    let members = services
        .room_service
        .list_members(&room.id, &creator)
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_review_and_publish_flow() {
    let _guard = publish_lock();
    let publisher = Arc::new(FakePublisher::default());
    let Some((pool, services)) = setup(publisher.clone()).await else {
        return;
    };
    let creator = register(&services, UserRole::Creator).await;
    let editor = register(&services, UserRole::Editor).await;
    let room = services
        .room_service
        .create_room(&creator, "Publishing", None)
        .await
        .unwrap();
    let invite = services
        .invite_service
        .create_invite(&room.id, &creator, None, None)
        .await
        .unwrap();
    services
        .invite_service
        .redeem(&invite.invite.token, &editor)
        .await
        .unwrap();

    let video = services
        .video_service
        .upload(&room.id, &editor, sample_video())
        .await
        .unwrap();
    assert_eq!(video.status, VideoStatus::Pending);

    // Editors cannot review their own uploads
    let err = services
        .video_service
        .approve(&video.id, &editor, ApproveVideo::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));

    let approved = services
        .video_service
        .approve(
            &video.id,
            &creator,
            ApproveVideo {
                title: Some("Episode 12".to_string()),
                ..ApproveVideo::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(approved.status, VideoStatus::Approved);
    assert_eq!(approved.title, "Episode 12");

    // A second decision on the same video is a conflict
    let err = services
        .video_service
        .reject(&video.id, &creator, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // No YouTube account yet: the attempt is recorded as a failure
    let failed = services.publish_service.publish(&video.id).await.unwrap();
    assert_eq!(failed.status, VideoStatus::UploadFailed);
    assert_eq!(failed.publish_error.as_deref(), Some("YouTube account not connected"));

    connect_youtube(&pool, &creator).await;
    let uploaded = services.publish_service.publish(&video.id).await.unwrap();
    assert_eq!(uploaded.status, VideoStatus::Uploaded);
    assert_eq!(uploaded.youtube_video_id.as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(uploaded.publish_attempts, 2);
    assert!(uploaded.publish_error.is_none());
    assert_eq!(publisher.uploads.load(Ordering::SeqCst), 1);

    // Uploaded is terminal
    let err = services.publish_service.publish(&video.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_destination_failure_is_recorded() {
    let _guard = publish_lock();
    let publisher = Arc::new(FakePublisher {
        fail: true,
        ..FakePublisher::default()
    });
    let Some((pool, services)) = setup(publisher).await else {
        return;
    };
    let creator = register(&services, UserRole::Creator).await;
    connect_youtube(&pool, &creator).await;
    let room = services
        .room_service
        .create_room(&creator, "Solo", None)
        .await
        .unwrap();

    let video = services
        .video_service
        .upload(&room.id, &creator, sample_video())
        .await
        .unwrap();
    services
        .video_service
        .approve(&video.id, &creator, ApproveVideo::default())
        .await
        .unwrap();

    let failed = services.publish_service.publish(&video.id).await.unwrap();
    assert_eq!(failed.status, VideoStatus::UploadFailed);
    assert_eq!(failed.publish_error.as_deref(), Some("quotaExceeded"));

    // Failed uploads can be deleted by the owner, which removes the file
    services.video_service.delete(&video.id, &creator).await.unwrap();
    let err = services.video_service.get(&video.id, &creator).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

/// Room owned by a fresh creator with one editor admitted through an invite
async fn room_with_editor(services: &Services) -> (Actor, Actor, RoomId) {
    let creator = register(services, UserRole::Creator).await;
    let editor = register(services, UserRole::Editor).await;
    let room = services
        .room_service
        .create_room(&creator, "Review queue", None)
        .await
        .unwrap();
    let invite = services
        .invite_service
        .create_invite(&room.id, &creator, None, None)
        .await
        .unwrap();
    services
        .invite_service
        .redeem(&invite.invite.token, &editor)
        .await
        .unwrap();
    (creator, editor, room.id)
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_reviewer_checked_before_metadata() {
    let Some((_, services)) = setup(Arc::default()).await else {
        return;
    };
    let (_, editor, room_id) = room_with_editor(&services).await;
    let video = services
        .video_service
        .upload(&room_id, &editor, sample_video())
        .await
        .unwrap();

    let err = services
        .video_service
        .approve(
            &video.id,
            &editor,
            ApproveVideo {
                title: Some("x".repeat(500)),
                ..ApproveVideo::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authorization(_)), "{err:?}");

    let err = services
        .video_service
        .reject(&video.id, &editor, Some("n".repeat(5000)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authorization(_)), "{err:?}");
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_auto_publish_on_approve() {
    let _guard = publish_lock();
    let publisher = Arc::new(FakePublisher::default());
    let Some((pool, services)) = setup_with(publisher.clone(), |config| {
        config.publishing.auto_publish_on_approve = true;
    })
    .await
    else {
        return;
    };
    let (creator, editor, room_id) = room_with_editor(&services).await;
    connect_youtube(&pool, &creator).await;

    let video = services
        .video_service
        .upload(&room_id, &editor, sample_video())
        .await
        .unwrap();
    let approved = services
        .video_service
        .approve(&video.id, &creator, ApproveVideo::default())
        .await
        .unwrap();
    assert_eq!(approved.status, VideoStatus::Processing);
    assert_eq!(approved.publish_attempts, 1);

    let mut current = approved;
    for _ in 0..100 {
        if current.status != VideoStatus::Processing {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        current = services.video_service.get(&video.id, &creator).await.unwrap();
    }
    assert_eq!(current.status, VideoStatus::Uploaded);
    assert_eq!(current.youtube_video_id.as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(publisher.uploads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_interrupted_publish_can_be_retried() {
    let _guard = publish_lock();
    let publisher = Arc::new(FakePublisher::default());
    let Some((pool, services)) = setup(publisher.clone()).await else {
        return;
    };
    let (creator, editor, room_id) = room_with_editor(&services).await;
    let video = services
        .video_service
        .upload(&room_id, &editor, sample_video())
        .await
        .unwrap();
    services
        .video_service
        .approve(&video.id, &creator, ApproveVideo::default())
        .await
        .unwrap();

    // A process that died mid-upload leaves the claim behind
    sqlx::query("UPDATE videos SET status = 'processing', publish_attempts = 1 WHERE id = $1")
        .bind(video.id.as_str())
        .execute(&pool)
        .await
        .unwrap();
    let err = services
        .video_service
        .publish(&video.id, &creator)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let recovered = services.publish_service.recover_interrupted().await.unwrap();
    assert!(recovered >= 1);

    let failed = services.video_service.get(&video.id, &creator).await.unwrap();
    assert_eq!(failed.status, VideoStatus::UploadFailed);
    assert_eq!(failed.publish_error.as_deref(), Some(INTERRUPTED_MESSAGE));

    connect_youtube(&pool, &creator).await;
    let uploaded = services.publish_service.publish(&video.id).await.unwrap();
    assert_eq!(uploaded.status, VideoStatus::Uploaded);
    assert_eq!(uploaded.publish_attempts, 2);
    assert_eq!(publisher.uploads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_shutdown_waits_for_running_upload() {
    let _guard = publish_lock();
    let publisher = Arc::new(FakePublisher {
        delay: Some(std::time::Duration::from_millis(300)),
        ..FakePublisher::default()
    });
    let Some((pool, services)) = setup(publisher.clone()).await else {
        return;
    };
    let (creator, editor, room_id) = room_with_editor(&services).await;
    connect_youtube(&pool, &creator).await;
    let video = services
        .video_service
        .upload(&room_id, &editor, sample_video())
        .await
        .unwrap();
    services
        .video_service
        .approve(&video.id, &creator, ApproveVideo::default())
        .await
        .unwrap();

    let processing = services
        .video_service
        .publish(&video.id, &creator)
        .await
        .unwrap();
    assert_eq!(processing.status, VideoStatus::Processing);

    let drained = services
        .publish_service
        .shutdown(std::time::Duration::from_secs(10))
        .await;
    assert!(drained);

    let uploaded = services.video_service.get(&video.id, &creator).await.unwrap();
    assert_eq!(uploaded.status, VideoStatus::Uploaded);
    assert_eq!(publisher.uploads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_expiring_token_is_refreshed_and_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.refreshed",
            "token_type": "Bearer",
            "expires_in": 3599,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token_url = format!("{}/token", server.uri());
    let Some((pool, services)) = setup_with(Arc::default(), |config| {
        config.youtube.client_id = "client-id".to_string();
        config.youtube.client_secret = "client-secret".to_string();
        config.youtube.token_url = token_url;
    })
    .await
    else {
        return;
    };

    // Expires inside the refresh margin
    let creator = register(&services, UserRole::Creator).await;
    store_youtube_account(
        &pool,
        &creator,
        "ya29.stale",
        Some("1//refresh"),
        Utc::now() + Duration::seconds(30),
    )
    .await;

    let token = services
        .youtube_service
        .access_token(&creator.user_id)
        .await
        .unwrap();
    assert_eq!(token, "ya29.refreshed");

    let stored = YouTubeAccountRepository::new(pool.clone())
        .get(&creator.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "ya29.refreshed");
    assert_eq!(stored.refresh_token.as_deref(), Some("1//refresh"));
    assert!(stored.expires_at > Utc::now() + Duration::minutes(55));

    // Fresh token is served from storage without another refresh
    let token = services
        .youtube_service
        .access_token(&creator.user_id)
        .await
        .unwrap();
    assert_eq!(token, "ya29.refreshed");

    // Expired with nothing to refresh with
    let stranded = register(&services, UserRole::Creator).await;
    store_youtube_account(&pool, &stranded, "ya29.old", None, Utc::now() - Duration::hours(1))
        .await;
    let err = services
        .youtube_service
        .access_token(&stranded.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(_)), "{err:?}");
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_login_failures_look_alike() {
    let Some((_, services)) = setup(Arc::default()).await else {
        return;
    };
    let editor = register(&services, UserRole::Editor).await;
    let username = services
        .user_service
        .get_user(&editor.user_id)
        .await
        .unwrap()
        .username;

    let unknown = services
        .user_service
        .login(&unique("ghost"), "correct horse battery")
        .await
        .unwrap_err();
    let wrong = services
        .user_service
        .login(&username, "incorrect horse battery")
        .await
        .unwrap_err();
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert!(matches!(unknown, Error::Authentication(_)));

    services
        .user_service
        .login(&username, "correct horse battery")
        .await
        .unwrap();
}

//! Service initialization and dependency injection

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    service::{
        CredentialEncryption, InviteService, JwtService, PublishService, RoomService,
        UserService, VideoPublisher, VideoService, VideoStorage, YouTubeAccountService,
        YouTubeOAuth, YouTubePublisher,
    },
    Config,
};

/// Container for all initialized services
#[derive(Clone)]
pub struct Services {
    pub jwt_service: JwtService,
    pub user_service: UserService,
    pub room_service: RoomService,
    pub invite_service: InviteService,
    pub video_service: VideoService,
    pub publish_service: PublishService,
    pub youtube_service: YouTubeAccountService,
    pub storage: VideoStorage,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

/// Build the service graph from configuration.
///
/// `storage` and `publisher` are passed in so tests can substitute memory
/// storage or a fake destination; [`init_services`] supplies the real ones.
pub fn build_services(
    pool: PgPool,
    config: &Config,
    storage: VideoStorage,
    publisher: Arc<dyn VideoPublisher>,
) -> anyhow::Result<Services> {
    let jwt_service = JwtService::from_config(&config.jwt)?;
    let encryption = CredentialEncryption::from_config(&config.credentials.encryption_key)?;

    let oauth = if config.youtube.is_configured() {
        Some(YouTubeOAuth::new(&config.youtube)?)
    } else {
        warn!("youtube.client_id/client_secret not set; channel linking is disabled");
        None
    };

    let user_service = UserService::new(pool.clone(), jwt_service.clone());
    let room_service = RoomService::new(pool.clone());
    let invite_service =
        InviteService::new(pool.clone(), room_service.clone(), config.invites.clone());
    let youtube_service =
        YouTubeAccountService::new(pool.clone(), oauth, publisher.clone(), encryption);
    let publish_service = PublishService::new(
        pool.clone(),
        storage.clone(),
        youtube_service.clone(),
        publisher,
        &config.youtube,
    );
    let video_service = VideoService::new(
        pool,
        room_service.clone(),
        storage.clone(),
        publish_service.clone(),
        config.youtube.default_privacy,
        config.publishing.auto_publish_on_approve,
    );

    Ok(Services {
        jwt_service,
        user_service,
        room_service,
        invite_service,
        video_service,
        publish_service,
        youtube_service,
        storage,
    })
}

/// Initialize all core services with the configured storage and the YouTube publisher
pub fn init_services(pool: PgPool, config: &Config) -> anyhow::Result<Services> {
    info!("Initializing services...");

    let storage = VideoStorage::from_config(&config.storage)?;
    let publisher: Arc<dyn VideoPublisher> = Arc::new(YouTubePublisher::new(&config.youtube)?);
    let services = build_services(pool, config, storage, publisher)?;

    info!(
        auto_publish = config.publishing.auto_publish_on_approve,
        "Services initialized"
    );
    Ok(services)
}

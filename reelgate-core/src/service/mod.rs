pub mod auth;
pub mod credential_encryption;
pub mod invite;
pub mod publish;
pub mod room;
pub mod storage;
pub mod user;
pub mod video;
pub mod youtube;

pub use auth::{hash_password, verify_password, Claims, JwtService, JwtValidator, TokenType};
pub use credential_encryption::CredentialEncryption;
pub use invite::{InvitePreview, InviteService, InviteWithLink};
pub use publish::PublishService;
pub use room::RoomService;
pub use storage::VideoStorage;
pub use user::{TokenPair, UserService};
pub use video::VideoService;
pub use youtube::{
    PublishRequest, PublishedVideo, VideoPublisher, YouTubeAccountService, YouTubeOAuth,
    YouTubePublisher,
};

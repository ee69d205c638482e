//! YouTube channel linking and publishing

mod account;
mod oauth;
mod publisher;

pub use account::YouTubeAccountService;
pub use oauth::{OAuthTokens, YouTubeOAuth, SCOPE_READONLY, SCOPE_UPLOAD};
pub use publisher::{ChannelInfo, PublishRequest, PublishedVideo, VideoPublisher, YouTubePublisher};

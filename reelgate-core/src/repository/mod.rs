pub mod invite;
pub mod room;
pub mod user;
pub mod video;
pub mod youtube_account;

pub use invite::InviteRepository;
pub use room::RoomRepository;
pub use user::UserRepository;
pub use video::{ReviewUpdate, VideoRepository};
pub use youtube_account::YouTubeAccountRepository;

pub mod id;
pub mod invite;
pub mod room;
pub mod user;
pub mod video;
pub mod youtube_account;

pub use id::{generate_id, InviteId, RoomId, UserId, VideoId};
pub use invite::{Invite, InviteAvailability, INVITE_TOKEN_LENGTH};
pub use room::{Room, RoomAccess, RoomMember, RoomMemberWithUser, RoomWithCount};
pub use user::{Actor, User, UserRole};
pub use video::{ApproveVideo, NewVideo, PrivacyStatus, Video, VideoStatus};
pub use youtube_account::YouTubeAccount;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::{RoomId, UserId, VideoId};

/// Place of a video in the approval-to-publish pipeline
///
/// ```text
/// pending ──► approved ──► processing ──► uploaded
///    │                        ▲   │
///    ▼                        │   ▼
/// rejected                 upload_failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
    Uploaded,
    UploadFailed,
}

impl VideoStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Processing,
        Self::Uploaded,
        Self::UploadFailed,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Processing => "processing",
            Self::Uploaded => "uploaded",
            Self::UploadFailed => "upload_failed",
        }
    }

    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected)
                | (Self::Approved | Self::UploadFailed, Self::Processing)
                | (Self::Processing, Self::Uploaded | Self::UploadFailed)
        )
    }

    /// Statuses from which `next` may be entered
    #[must_use]
    pub fn sources_of(next: Self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Uploaded)
    }

    /// Whether a publish attempt may start from this status
    #[must_use]
    pub const fn is_publishable(&self) -> bool {
        self.can_transition_to(Self::Processing)
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "processing" => Ok(Self::Processing),
            "uploaded" => Ok(Self::Uploaded),
            "upload_failed" => Ok(Self::UploadFailed),
            _ => Err(format!("Unknown video status: {s}")),
        }
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// YouTube privacy status applied on publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl PrivacyStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Unlisted => "unlisted",
            Self::Public => "public",
        }
    }
}

impl FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "unlisted" => Ok(Self::Unlisted),
            "public" => Ok(Self::Public),
            _ => Err(format!("Unknown privacy status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub room_id: RoomId,
    pub uploaded_by: UserId,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: VideoStatus,
    pub review_note: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub privacy: PrivacyStatus,
    pub youtube_video_id: Option<String>,
    pub publish_error: Option<String>,
    pub publish_attempts: i32,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    #[must_use]
    pub fn youtube_url(&self) -> Option<String> {
        self.youtube_video_id
            .as_ref()
            .map(|id| format!("https://www.youtube.com/watch?v={id}"))
    }
}

/// Editor-supplied upload, before it is stored
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub file_name: String,
    pub content_type: String,
    pub privacy: Option<PrivacyStatus>,
    pub bytes: bytes::Bytes,
}

/// Creator's approval, optionally overriding publish metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApproveVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub privacy: Option<PrivacyStatus>,
    pub note: Option<String>,
}

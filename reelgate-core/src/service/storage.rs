//! Object storage for uploaded video files
//!
//! Backed by OpenDAL so the same code writes to a local directory, an
//! S3-compatible bucket, or memory in tests.

use bytes::Bytes;
use opendal::{services, ErrorKind, Operator};

use crate::{
    config::{StorageBackend, StorageConfig},
    models::{RoomId, VideoId},
    Error, Result,
};

const MAX_FILE_NAME_LENGTH: usize = 120;

#[derive(Clone)]
pub struct VideoStorage {
    operator: Operator,
}

impl std::fmt::Debug for VideoStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoStorage")
            .field("scheme", &self.operator.info().scheme())
            .finish()
    }
}

impl VideoStorage {
    #[must_use]
    pub const fn new(operator: Operator) -> Self {
        Self { operator }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let operator = match config.backend {
            StorageBackend::Fs => {
                tracing::info!(root = %config.root, "Using filesystem video storage");
                Operator::new(services::Fs::default().root(&config.root))?.finish()
            }
            StorageBackend::S3 => {
                tracing::info!(
                    bucket = %config.s3_bucket,
                    region = %config.s3_region,
                    "Using S3 video storage"
                );
                let mut builder = services::S3::default()
                    .bucket(&config.s3_bucket)
                    .region(&config.s3_region)
                    .root(&config.root);
                if let Some(endpoint) = &config.s3_endpoint {
                    builder = builder.endpoint(endpoint);
                }
                if let Some(key_id) = &config.s3_access_key_id {
                    builder = builder.access_key_id(key_id);
                }
                if let Some(secret) = &config.s3_secret_access_key {
                    builder = builder.secret_access_key(secret);
                }
                Operator::new(builder)?.finish()
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory video storage; files are lost on restart");
                Operator::new(services::Memory::default())?.finish()
            }
        };

        Ok(Self::new(operator))
    }

    /// In-memory storage for tests
    pub fn memory() -> Result<Self> {
        Ok(Self::new(Operator::new(services::Memory::default())?.finish()))
    }

    pub async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        let size = bytes.len();
        self.operator.write(key, bytes).await?;
        tracing::debug!(key, size, "Stored video file");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Bytes> {
        match self.operator.read(key).await {
            Ok(buffer) => Ok(buffer.to_bytes()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound("Video file not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deleting a missing key succeeds
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.operator.delete(key).await?;
        tracing::debug!(key, "Deleted video file");
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.operator.stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Storage key for an upload: `videos/{room_id}/{video_id}/{file_name}`
#[must_use]
pub fn video_key(room_id: &RoomId, video_id: &VideoId, file_name: &str) -> String {
    format!(
        "videos/{}/{}/{}",
        room_id.as_str(),
        video_id.as_str(),
        sanitize_file_name(file_name)
    )
}

/// Reduce a client-supplied file name to a safe single path segment
#[must_use]
pub fn sanitize_file_name(file_name: &str) -> String {
    // Browsers on Windows may send a full path
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return "video".to_string();
    }

    // Keep the extension when truncating
    if cleaned.len() > MAX_FILE_NAME_LENGTH {
        match cleaned.rsplit_once('.') {
            Some((stem, ext)) if ext.len() < 16 => {
                let keep = MAX_FILE_NAME_LENGTH - ext.len() - 1;
                format!("{}.{ext}", &stem[..keep.min(stem.len())])
            }
            _ => cleaned[..MAX_FILE_NAME_LENGTH].to_string(),
        }
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("My Holiday (final).mov"), "My_Holiday__final_.mov");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\cut.webm"), "cut.webm");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "video");
        assert_eq!(sanitize_file_name("..."), "video");
    }

    #[test]
    fn test_sanitize_long_name_keeps_extension() {
        let long = format!("{}.mp4", "a".repeat(300));
        let out = sanitize_file_name(&long);
        assert_eq!(out.len(), MAX_FILE_NAME_LENGTH);
        assert!(out.ends_with(".mp4"));
    }

    #[test]
    fn test_video_key() {
        let room = RoomId::from_string("room00000001".to_string());
        let video = VideoId::from_string("video0000001".to_string());
        assert_eq!(
            video_key(&room, &video, "a b.mp4"),
            "videos/room00000001/video0000001/a_b.mp4"
        );
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let storage = VideoStorage::memory().unwrap();
        let key = "videos/r/v/clip.mp4";

        assert!(!storage.exists(key).await.unwrap());
        storage.put(key, Bytes::from_static(b"frames")).await.unwrap();
        assert!(storage.exists(key).await.unwrap());
        assert_eq!(storage.get(key).await.unwrap(), Bytes::from_static(b"frames"));

        storage.delete(key).await.unwrap();
        assert!(!storage.exists(key).await.unwrap());
        assert!(matches!(storage.get(key).await, Err(Error::NotFound(_))));
        storage.delete(key).await.unwrap();
    }
}

//! YouTube Data API v3 upload adapter
//!
//! Uploads use the resumable protocol: a metadata POST opens an upload
//! session whose URI comes back in `Location`, then the file bytes are PUT
//! to that URI and the response carries the new video resource.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::{config::YouTubeConfig, models::PrivacyStatus, Error, Result};

/// YouTube rejects more than 500 characters of tags in total
const MAX_TAGS_CHARS: usize = 500;

/// Everything needed to create one video on the creator's channel
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: PrivacyStatus,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVideo {
    pub video_id: String,
}

/// Channel the token belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
}

/// Destination that accepts approved videos
#[async_trait]
pub trait VideoPublisher: Send + Sync {
    async fn publish(&self, access_token: &str, request: &PublishRequest) -> Result<PublishedVideo>;

    /// Channel owned by the token's user, if the platform exposes one
    async fn fetch_channel(&self, access_token: &str) -> Result<Option<ChannelInfo>>;
}

#[derive(Debug, Clone)]
pub struct YouTubePublisher {
    http: Client,
    api_base: String,
}

#[derive(Deserialize)]
struct UploadedVideo {
    id: String,
}

#[derive(Deserialize)]
struct ChannelList {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
}

#[derive(Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl YouTubePublisher {
    pub fn new(config: &YouTubeConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("reelgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn start_session(&self, access_token: &str, request: &PublishRequest) -> Result<String> {
        let metadata = json!({
            "snippet": {
                "title": request.title,
                "description": request.description,
                "tags": clamp_tags(&request.tags),
                "categoryId": request.category_id,
            },
            "status": {
                "privacyStatus": request.privacy.as_str(),
                "selfDeclaredMadeForKids": false,
            },
        });

        let response = self
            .http
            .post(format!("{}/upload/youtube/v3/videos", self.api_base))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", &request.content_type)
            .header("X-Upload-Content-Length", request.bytes.len())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::External(format!("YouTube upload request failed: {e}")))?;

        let response = check_status(response, "start upload").await?;

        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::External("YouTube did not return an upload session URL".to_string())
            })
    }
}

#[async_trait]
impl VideoPublisher for YouTubePublisher {
    async fn publish(&self, access_token: &str, request: &PublishRequest) -> Result<PublishedVideo> {
        let session_url = self.start_session(access_token, request).await?;
        tracing::debug!(size = request.bytes.len(), "Opened YouTube upload session");

        let response = self
            .http
            .put(&session_url)
            .bearer_auth(access_token)
            .header(header::CONTENT_TYPE, &request.content_type)
            .body(request.bytes.clone())
            .send()
            .await
            .map_err(|e| Error::External(format!("YouTube upload failed: {e}")))?;

        let video: UploadedVideo = check_status(response, "upload video")
            .await?
            .json()
            .await
            .map_err(|e| Error::External(format!("Unexpected YouTube upload response: {e}")))?;

        Ok(PublishedVideo { video_id: video.id })
    }

    async fn fetch_channel(&self, access_token: &str) -> Result<Option<ChannelInfo>> {
        let response = self
            .http
            .get(format!("{}/youtube/v3/channels", self.api_base))
            .query(&[("part", "snippet"), ("mine", "true")])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::External(format!("YouTube channel lookup failed: {e}")))?;

        let list: ChannelList = check_status(response, "look up channel")
            .await?
            .json()
            .await
            .map_err(|e| Error::External(format!("Unexpected YouTube channel response: {e}")))?;

        Ok(list.items.into_iter().next().map(|item| ChannelInfo {
            id: item.id,
            title: item.snippet.title,
        }))
    }
}

/// Map non-2xx responses to errors, keeping Google's message when there is one
async fn check_status(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());

    if status == StatusCode::UNAUTHORIZED {
        Err(Error::Authentication(format!(
            "YouTube rejected the access token: {message}"
        )))
    } else {
        Err(Error::External(format!(
            "YouTube failed to {action} ({status}): {message}"
        )))
    }
}

/// Drop trailing tags once the combined length passes YouTube's limit
fn clamp_tags(tags: &[String]) -> Vec<&str> {
    let mut total = 0;
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take_while(|t| {
            total += t.chars().count();
            total <= MAX_TAGS_CHARS
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn publisher(server: &MockServer) -> YouTubePublisher {
        YouTubePublisher::new(&YouTubeConfig {
            api_base_url: server.uri(),
            ..YouTubeConfig::default()
        })
        .unwrap()
    }

    fn request() -> PublishRequest {
        PublishRequest {
            title: "Episode 1".to_string(),
            description: "First cut".to_string(),
            tags: vec!["vlog".to_string(), "travel".to_string()],
            category_id: "22".to_string(),
            privacy: PrivacyStatus::Unlisted,
            content_type: "video/mp4".to_string(),
            bytes: Bytes::from_static(b"fake mp4 bytes"),
        }
    }

    #[tokio::test]
    async fn test_resumable_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .and(query_param("uploadType", "resumable"))
            .and(query_param("part", "snippet,status"))
            .and(header_eq("authorization", "Bearer ya29.token"))
            .and(header_eq("x-upload-content-type", "video/mp4"))
            .and(header_eq("x-upload-content-length", "14"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}/upload-session/abc", server.uri())),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload-session/abc"))
            .and(header_eq("content-type", "video/mp4"))
            .and(body_bytes(b"fake mp4 bytes".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "youtube#video",
                "id": "dQw4w9WgXcQ",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let published = publisher(&server)
            .publish("ya29.token", &request())
            .await
            .unwrap();
        assert_eq!(published.video_id, "dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "code": 401, "message": "Invalid Credentials" }
            })))
            .mount(&server)
            .await;

        let err = publisher(&server).publish("expired", &request()).await.unwrap_err();
        match err {
            Error::Authentication(msg) => assert!(msg.contains("Invalid Credentials")),
            other => panic!("expected Authentication, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_quota_error_is_external() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": { "code": 403, "message": "The request cannot be completed because you have exceeded your quota." }
            })))
            .mount(&server)
            .await;

        match publisher(&server).publish("token", &request()).await {
            Err(Error::External(msg)) => assert!(msg.contains("exceeded your quota")),
            other => panic!("expected External, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_location_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = publisher(&server).publish("token", &request()).await.unwrap_err();
        assert!(matches!(err, Error::External(_)));
    }

    #[tokio::test]
    async fn test_fetch_channel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .and(query_param("part", "snippet"))
            .and(query_param("mine", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "id": "UC123", "snippet": { "title": "My Channel" } }]
            })))
            .mount(&server)
            .await;

        let channel = publisher(&server).fetch_channel("token").await.unwrap();
        assert_eq!(
            channel,
            Some(ChannelInfo {
                id: "UC123".to_string(),
                title: "My Channel".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_fetch_channel_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        assert_eq!(publisher(&server).fetch_channel("token").await.unwrap(), None);
    }

    #[test]
    fn test_clamp_tags() {
        let tags = vec![" a ".to_string(), String::new(), "b".repeat(499), "c".to_string()];
        assert_eq!(clamp_tags(&tags), vec!["a".to_string(), "b".repeat(499)]);
    }
}

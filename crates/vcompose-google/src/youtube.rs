//! YouTube Data API v3 client: resumable video upload and thumbnail set.

use std::path::Path;
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use vcompose_models::HostedVideo;

use crate::auth::AccessTokenSource;
use crate::error::GoogleResult;
use crate::http::{error_for_response, send_authorized, start_resumable_session, upload_to_session};

pub const YOUTUBE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";

/// "People & Blogs"
pub const DEFAULT_CATEGORY_ID: &str = "22";
pub const DEFAULT_PRIVACY: &str = "unlisted";

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

#[derive(Clone)]
pub struct YouTubeClient {
    http: Client,
    tokens: Arc<dyn AccessTokenSource>,
    upload_base: String,
}

impl YouTubeClient {
    pub fn new(http: Client, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http,
            tokens,
            upload_base: YOUTUBE_UPLOAD_BASE.to_string(),
        }
    }

    pub fn with_upload_base(mut self, upload_base: impl Into<String>) -> Self {
        self.upload_base = upload_base.into();
        self
    }

    /// Upload a video as unlisted and optionally set its thumbnail.
    ///
    /// Thumbnail failures are logged and ignored; the video is already live.
    pub async fn publish_video(
        &self,
        path: &Path,
        title: &str,
        description: &str,
        thumbnail: Option<&Path>,
    ) -> GoogleResult<HostedVideo> {
        let len = tokio::fs::metadata(path).await?.len();
        let init_url = format!(
            "{}/videos?uploadType=resumable&part=snippet,status",
            self.upload_base
        );
        let metadata = json!({
            "snippet": {
                "title": title,
                "description": description,
                "categoryId": DEFAULT_CATEGORY_ID,
            },
            "status": {
                "privacyStatus": DEFAULT_PRIVACY,
            },
        });

        info!(title, bytes = len, "Starting YouTube upload");
        let session = start_resumable_session(
            &self.http,
            self.tokens.as_ref(),
            &init_url,
            &metadata,
            "video/*",
            len,
        )
        .await?;

        let uploaded: UploadedVideo =
            upload_to_session(&self.http, self.tokens.as_ref(), &session, path, "video/*").await?;
        let video = HostedVideo::from_youtube_id(uploaded.id);
        info!(video_id = %video.id, url = %video.url, "Uploaded to YouTube");

        if let Some(thumb) = thumbnail {
            if let Err(e) = self.set_thumbnail(&video.id, thumb).await {
                warn!(video_id = %video.id, error = %e, "Thumbnail upload failed, continuing");
            }
        }

        Ok(video)
    }

    /// Replace the thumbnail of an uploaded video.
    pub async fn set_thumbnail(&self, video_id: &str, image: &Path) -> GoogleResult<()> {
        let bytes = tokio::fs::read(image).await?;
        let content_type = thumbnail_content_type(image);
        let url = format!(
            "{}/thumbnails/set?videoId={}",
            self.upload_base,
            urlencoding::encode(video_id)
        );

        let response = send_authorized(self.tokens.as_ref(), |token| {
            self.http
                .post(&url)
                .bearer_auth(token)
                .header(CONTENT_TYPE, content_type)
                .body(bytes.clone())
        })
        .await?;

        if !response.status().is_success() {
            return Err(error_for_response("thumbnail set", response).await);
        }

        info!(video_id, "Thumbnail set");
        Ok(())
    }
}

fn thumbnail_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}

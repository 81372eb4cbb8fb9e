//! Google Drive v3 client: download by file id, resumable upload into a folder.

use std::path::Path;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::info;

use vcompose_models::DriveFile;

use crate::auth::AccessTokenSource;
use crate::error::{GoogleError, GoogleResult};
use crate::http::{
    error_for_response, send_authorized, start_resumable_session, upload_to_session,
    write_body_to_file,
};

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields requested for uploaded files.
const UPLOAD_FIELDS: &str = "id,name,webViewLink";

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    tokens: Arc<dyn AccessTokenSource>,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    pub fn new(http: Client, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http,
            tokens,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }

    /// Point the client at a different host (tests, proxies).
    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    /// Download a file's content to `dest`. Returns bytes written.
    ///
    /// A missing or inaccessible file yields [`GoogleError::NotFound`].
    pub async fn download_file(&self, file_id: &str, dest: &Path) -> GoogleResult<u64> {
        let url = format!(
            "{}/files/{}?alt=media&supportsAllDrives=true",
            self.api_base,
            urlencoding::encode(file_id)
        );

        let response =
            send_authorized(self.tokens.as_ref(), |token| self.http.get(&url).bearer_auth(token))
                .await?;

        match response.status() {
            status if status.is_success() => {
                let written = write_body_to_file(response, dest).await?;
                info!(file_id, bytes = written, dest = %dest.display(), "Downloaded Drive file");
                Ok(written)
            }
            StatusCode::NOT_FOUND => Err(GoogleError::NotFound(format!("drive file {}", file_id))),
            _ => Err(error_for_response(&format!("drive download {}", file_id), response).await),
        }
    }

    /// Upload a local file as `name` into `folder_id`.
    pub async fn upload_file(
        &self,
        path: &Path,
        name: &str,
        folder_id: &str,
        mime_type: &str,
    ) -> GoogleResult<DriveFile> {
        let len = tokio::fs::metadata(path).await?.len();
        let init_url = format!(
            "{}/files?uploadType=resumable&supportsAllDrives=true&fields={}",
            self.upload_base, UPLOAD_FIELDS
        );
        let metadata = json!({
            "name": name,
            "parents": [folder_id],
        });

        let session = start_resumable_session(
            &self.http,
            self.tokens.as_ref(),
            &init_url,
            &metadata,
            mime_type,
            len,
        )
        .await?;

        let file: DriveFile =
            upload_to_session(&self.http, self.tokens.as_ref(), &session, path, mime_type).await?;

        info!(file_id = %file.id, name = %file.name, folder_id, "Uploaded to Drive");
        Ok(file)
    }
}

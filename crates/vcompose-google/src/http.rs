//! Request helpers shared by the Drive and YouTube clients.
//!
//! Resumable uploads follow Google's two-step protocol: a metadata POST that
//! returns a session URI in `Location`, then a single PUT of the file bytes
//! to that URI.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::auth::AccessTokenSource;
use crate::error::{GoogleError, GoogleResult};

/// Read size for streamed upload bodies.
const UPLOAD_CHUNK_BYTES: usize = 8 * 1024 * 1024;

/// Build an HTTP client with the timeouts used for API calls.
///
/// No overall request timeout: uploads of large artifacts are bounded by the
/// job timeout instead.
pub fn build_http_client() -> GoogleResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("vcompose/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(GoogleError::Network)
}

/// Send a request with a bearer token, refreshing the token once on 401.
pub(crate) async fn send_authorized<F>(
    tokens: &dyn AccessTokenSource,
    build: F,
) -> GoogleResult<Response>
where
    F: Fn(&str) -> RequestBuilder,
{
    let token = tokens.access_token().await?;
    let response = build(&token).send().await?;

    if response.status() != StatusCode::UNAUTHORIZED {
        return Ok(response);
    }

    debug!("Access token rejected, refreshing once");
    tokens.invalidate().await;
    let token = tokens.access_token().await?;
    Ok(build(&token).send().await?)
}

/// Turn a non-success response into an error carrying the body.
pub(crate) async fn error_for_response(what: &str, response: Response) -> GoogleError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    GoogleError::from_http_status(status.as_u16(), format!("{} failed: {}", what, body))
}

/// Start a resumable upload session and return its URI.
pub(crate) async fn start_resumable_session(
    http: &Client,
    tokens: &dyn AccessTokenSource,
    init_url: &str,
    metadata: &serde_json::Value,
    content_type: &str,
    content_length: u64,
) -> GoogleResult<String> {
    let response = send_authorized(tokens, |token| {
        http.post(init_url)
            .bearer_auth(token)
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", content_length.to_string())
            .json(metadata)
    })
    .await?;

    if !response.status().is_success() {
        return Err(error_for_response("upload session start", response).await);
    }

    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| GoogleError::invalid_response("no Location header in upload session response"))
}

/// PUT a local file to a resumable session and decode the final JSON resource.
pub(crate) async fn upload_to_session<T: DeserializeOwned>(
    http: &Client,
    tokens: &dyn AccessTokenSource,
    session_url: &str,
    path: &Path,
    content_type: &str,
) -> GoogleResult<T> {
    let (body, len) = file_body(path).await?;
    let token = tokens.access_token().await?;

    let response = http
        .put(session_url)
        .bearer_auth(token)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, len)
        .body(body)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(error_for_response("upload", response).await);
    }

    Ok(response.json().await?)
}

/// Stream a file as a request body, logging progress at every 10%.
async fn file_body(path: &Path) -> GoogleResult<(Body, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let total = file.metadata().await?.len();
    let sent = Arc::new(AtomicU64::new(0));
    let label = path.display().to_string();

    let chunks = futures::stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; UPLOAD_CHUNK_BYTES];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((buf, file)))
    });

    let progress = chunks.inspect_ok(move |chunk| {
        let before = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        let after = before + chunk.len() as u64;
        if total > 0 && (before * 10 / total) != (after * 10 / total) {
            info!(
                file = %label,
                percent = after * 100 / total,
                "Upload progress"
            );
        }
    });

    Ok((Body::wrap_stream(progress), total))
}

/// Stream a response body into a file. Returns bytes written.
pub(crate) async fn write_body_to_file(response: Response, dest: &Path) -> GoogleResult<u64> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

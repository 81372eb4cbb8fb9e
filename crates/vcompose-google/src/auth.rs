//! Access token sources for Google APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{GoogleError, GoogleResult};
use crate::token_cache::CachedToken;

/// Read/write access to Drive files, including shared drives.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
/// Upload videos and set thumbnails.
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

pub const DRIVE_SCOPES: &[&str] = &[DRIVE_SCOPE];
pub const YOUTUBE_SCOPES: &[&str] = &[YOUTUBE_UPLOAD_SCOPE];

/// Google OAuth2 token endpoint.
pub const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Anything that can hand out a bearer token.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> GoogleResult<String>;

    /// Drop any cached token so the next call fetches a fresh one.
    async fn invalidate(&self) {}
}

/// A fixed token. Useful for tests and for tokens minted outside the job.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> GoogleResult<String> {
        Ok(self.0.clone())
    }
}

/// OAuth2 client credentials plus a long-lived refresh token.
#[derive(Debug, Clone)]
pub struct RefreshCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Exchanges a refresh token for access tokens, caching the result.
pub struct RefreshTokenSource {
    http: Client,
    credentials: RefreshCredentials,
    token_url: String,
    cache: RwLock<Option<CachedToken>>,
}

impl RefreshTokenSource {
    pub fn new(http: Client, credentials: RefreshCredentials) -> Self {
        Self {
            http,
            credentials,
            token_url: OAUTH_TOKEN_URL.to_string(),
            cache: RwLock::new(None),
        }
    }

    /// Override the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    async fn exchange(&self) -> GoogleResult<CachedToken> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // invalid_grant comes back as 400; it is always an auth problem here
            return Err(GoogleError::auth_error(format!(
                "refresh token exchange failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await?;
        debug!(expires_in = ?token.expires_in, "Exchanged refresh token");
        Ok(CachedToken::new(
            token.access_token,
            token.expires_in.map(Duration::from_secs),
        ))
    }
}

#[async_trait]
impl AccessTokenSource for RefreshTokenSource {
    async fn access_token(&self) -> GoogleResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(cached.access_token.clone());
        }

        let fresh = self.exchange().await?;
        let token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> RefreshCredentials {
        RefreshCredentials {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            refresh_token: "refresh-me".to_string(),
        }
    }

    #[tokio::test]
    async fn test_refresh_token_exchange_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = RefreshTokenSource::new(Client::new(), credentials())
            .with_token_url(format!("{}/token", server.uri()));

        assert_eq!(source.access_token().await.unwrap(), "ya29.fresh");
        assert_eq!(source.access_token().await.unwrap(), "ya29.fresh");
    }

    #[tokio::test]
    async fn test_invalid_grant_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
            )
            .mount(&server)
            .await;

        let source = RefreshTokenSource::new(Client::new(), credentials())
            .with_token_url(format!("{}/token", server.uri()));

        let err = source.access_token().await.unwrap_err();
        assert!(matches!(err, GoogleError::AuthError(msg) if msg.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn test_static_token() {
        let source = StaticToken("abc".to_string());
        assert_eq!(source.access_token().await.unwrap(), "abc");
        source.invalidate().await;
        assert_eq!(source.access_token().await.unwrap(), "abc");
    }
}

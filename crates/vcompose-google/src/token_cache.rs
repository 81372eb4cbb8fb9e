//! Token caching for Google API authentication.
//!
//! Provides a thread-safe, async-aware token cache with:
//! - Refresh margin to avoid token expiry during long uploads
//! - Single-flight refresh under a write lock
//! - Fallback to the existing token when a refresh fails but it is still usable

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::AccessTokenSource;
use crate::error::{GoogleError, GoogleResult};

/// Refresh margin: refresh token 60 seconds before expiry.
pub(crate) const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative token TTL when expiry is unknown (50 minutes).
pub(crate) const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// Cached token with expiration tracking.
#[derive(Debug, Clone)]
pub(crate) struct CachedToken {
    pub(crate) access_token: String,
    pub(crate) expires_at: Instant,
}

impl CachedToken {
    pub(crate) fn new(access_token: String, ttl: Option<Duration>) -> Self {
        Self {
            access_token,
            expires_at: Instant::now() + ttl.unwrap_or(TOKEN_DEFAULT_TTL),
        }
    }

    /// Check if token is still valid with refresh margin.
    pub(crate) fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    /// Check if token is technically still usable (even if refresh is needed).
    pub(crate) fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe cache over a `gcp_auth` provider for a fixed scope set.
pub struct TokenCache {
    auth: Arc<dyn TokenProvider>,
    scopes: &'static [&'static str],
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Create a new token cache.
    pub fn new(auth: Arc<dyn TokenProvider>, scopes: &'static [&'static str]) -> Self {
        Self {
            auth,
            scopes,
            cache: RwLock::new(None),
        }
    }

    /// Application default credentials (service account file, metadata
    /// server, or gcloud user credentials).
    pub async fn application_default(scopes: &'static [&'static str]) -> GoogleResult<Self> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| GoogleError::auth_error(format!("No Google credentials found: {}", e)))?;
        Ok(Self::new(provider, scopes))
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> GoogleResult<String> {
        // Fast path: check read lock first
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(cached.access_token.clone());
            }
        }

        self.refresh_token(&mut cache).await
    }

    async fn refresh_token(&self, cache: &mut Option<CachedToken>) -> GoogleResult<String> {
        match self.auth.token(self.scopes).await {
            Ok(token) => {
                let now = Utc::now();
                let exp = token.expires_at();

                // Already-expired tokens get an immediate expiry so the next call refreshes
                let ttl = if exp > now {
                    Some((exp - now).to_std().unwrap_or(TOKEN_DEFAULT_TTL))
                } else {
                    Some(Duration::ZERO)
                };

                let cached = CachedToken::new(token.as_str().to_string(), ttl);
                let access_token = cached.access_token.clone();
                *cache = Some(cached);

                debug!(scopes = ?self.scopes, "Refreshed Google access token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref() {
                    if cached.is_usable() {
                        warn!("Token refresh failed, using existing token: {}", e);
                        return Ok(cached.access_token.clone());
                    }
                }

                Err(GoogleError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                )))
            }
        }
    }
}

#[async_trait]
impl AccessTokenSource for TokenCache {
    async fn access_token(&self) -> GoogleResult<String> {
        self.get_token().await
    }

    async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}

//! Object store client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::SdkConfig;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Google Cloud Storage S3-interoperability endpoint.
pub const GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Configuration for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Region ("auto" for GCS and R2)
    pub region: String,
    /// HMAC access key; falls back to the default AWS credential chain when unset
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint_url: GCS_ENDPOINT.to_string(),
            region: "auto".to_string(),
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl ObjectStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint_url: std::env::var("OBJECT_STORE_ENDPOINT").unwrap_or(defaults.endpoint_url),
            region: std::env::var("OBJECT_STORE_REGION").unwrap_or(defaults.region),
            access_key_id: std::env::var("OBJECT_STORE_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("OBJECT_STORE_SECRET_ACCESS_KEY").ok(),
        }
    }

    /// URI scheme of locators returned for this endpoint.
    pub fn scheme(&self) -> &'static str {
        let is_gcs = url::Url::parse(&self.endpoint_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h == "storage.googleapis.com"))
            .unwrap_or(false);
        if is_gcs {
            "gs"
        } else {
            "s3"
        }
    }

    fn static_credentials(&self) -> StorageResult<Option<Credentials>> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Ok(Some(Credentials::new(
                id,
                secret,
                None,
                None,
                "vcompose",
            ))),
            (None, None) => Ok(None),
            _ => Err(StorageError::config_error(
                "OBJECT_STORE_ACCESS_KEY_ID and OBJECT_STORE_SECRET_ACCESS_KEY must be set together",
            )),
        }
    }
}

/// Client for a single bucket on an S3-compatible endpoint.
#[derive(Clone)]
pub struct ObjectStoreClient {
    client: Client,
    bucket: String,
    scheme: &'static str,
}

impl ObjectStoreClient {
    /// Create a new client for `bucket`.
    pub async fn new(config: ObjectStoreConfig, bucket: impl Into<String>) -> StorageResult<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(StorageError::config_error("bucket name is empty"));
        }

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .force_path_style(true);

        builder = match config.static_credentials()? {
            Some(credentials) => builder.credentials_provider(credentials),
            None => {
                let shared: SdkConfig = aws_config::defaults(BehaviorVersion::latest()).load().await;
                let provider = shared.credentials_provider().ok_or_else(|| {
                    StorageError::config_error("no object store credentials available")
                })?;
                builder.credentials_provider(provider)
            }
        };

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
            scheme: config.scheme(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Locator for `key`, e.g. `gs://bucket/key`.
    pub fn locator(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, key)
    }

    /// Upload a file and return its locator.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let locator = self.locator(key);
        info!("Uploaded {} to {}", path.display(), locator);
        Ok(locator)
    }

    /// Stream an object to a local file. Returns the number of bytes written.
    pub async fn download_file(&self, key: &str, path: impl AsRef<Path>) -> StorageResult<u64> {
        let path = path.as_ref();
        debug!("Downloading {} to {}", key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false)
                    || e.raw_response().map(|r| r.status().as_u16()) == Some(404);
                if missing {
                    StorageError::not_found(self.locator(key))
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut body = response.body;
        let mut written = 0u64;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Downloaded {} ({} bytes) to {}", key, written, path.display());
        Ok(written)
    }

    /// Check if an object exists.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(e.to_string()))
                }
            }
        }
    }
}

/// Join a prefix and a name into an object key, ignoring stray slashes.
pub fn object_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

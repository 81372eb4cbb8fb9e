//! Job error types.

use std::path::PathBuf;
use thiserror::Error;

use vcompose_google::GoogleError;
use vcompose_media::MediaError;
use vcompose_models::DriveIdError;
use vcompose_storage::StorageError;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    InvalidIdentifier(#[from] DriveIdError),

    #[error("Required asset missing or empty: {asset} ({location})")]
    AssetMissingOrEmpty { asset: String, location: String },

    #[error("Download of {} is empty or truncated: {bytes} bytes, expected at least {min_bytes}", .path.display())]
    EmptyOrCorruptDownload {
        path: PathBuf,
        bytes: u64,
        min_bytes: u64,
    },

    #[error("Publishing to {sink} failed: {message}")]
    PublicationFailure { sink: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Google API error: {0}")]
    Google(#[from] GoogleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn asset_missing(asset: impl Into<String>, location: impl Into<String>) -> Self {
        Self::AssetMissingOrEmpty {
            asset: asset.into(),
            location: location.into(),
        }
    }

    pub fn publication(sink: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::PublicationFailure {
            sink: sink.into(),
            message: err.to_string(),
        }
    }

    /// Short machine-readable kind for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::InvalidIdentifier(_) => "invalid_identifier",
            JobError::AssetMissingOrEmpty { .. } => "asset_missing_or_empty",
            JobError::EmptyOrCorruptDownload { .. } => "empty_or_corrupt_download",
            JobError::PublicationFailure { .. } => "publication_failure",
            JobError::Config(_) => "config",
            JobError::Timeout(_) => "timeout",
            JobError::Media(MediaError::NoVideoStream(_)) => "no_video_stream",
            JobError::Media(MediaError::MissingMainAudio(_)) => "missing_main_audio",
            JobError::Media(MediaError::Mux { .. }) => "mux",
            JobError::Media(MediaError::ExternalToolFailure { .. }) => "external_tool_failure",
            JobError::Media(_) => "media",
            JobError::Storage(_) => "storage",
            JobError::Google(_) => "google",
            JobError::Io(_) => "io",
        }
    }
}

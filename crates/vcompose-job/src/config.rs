//! Job configuration.
//!
//! Read once from the environment at startup and validated before any
//! download or ffmpeg invocation.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vcompose_google::RefreshCredentials;
use vcompose_models::AudioMixRecipe;
use vcompose_storage::ObjectStoreConfig;

use crate::error::{JobError, JobResult};

/// Default minimum size of a downloaded video (1 MiB).
pub const DEFAULT_MIN_DOWNLOAD_BYTES: u64 = 1024 * 1024;
/// Default minimum size of the music bed (64 KiB). Short MP3 beds are well under 1 MiB.
pub const DEFAULT_MIN_MUSIC_BYTES: u64 = 64 * 1024;
pub const DEFAULT_ASSETS_PREFIX: &str = "assets";

/// Where the fixed assets (background, outro, music) come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetSourceKind {
    /// Downloaded from the asset bucket under the asset prefix
    #[default]
    ObjectStore,
    /// Read from a pre-mounted directory
    Mounted,
}

impl FromStr for AssetSourceKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "object_store" | "gcs" | "s3" => Ok(Self::ObjectStore),
            "mounted" | "mount" | "local" => Ok(Self::Mounted),
            other => Err(JobError::config(format!("unknown ASSET_SOURCE: {}", other))),
        }
    }
}

/// Job configuration.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub asset_source: AssetSourceKind,
    pub assets_bucket: Option<String>,
    pub assets_prefix: String,
    pub assets_mount_dir: Option<PathBuf>,
    /// Endpoint and credentials shared by the asset and output buckets
    pub object_store: ObjectStoreConfig,
    pub drive_output_folder_id: Option<String>,
    pub skip_drive_upload: bool,
    pub outputs_bucket: Option<String>,
    pub outputs_prefix: Option<String>,
    /// OAuth2 refresh credentials for YouTube; application default credentials otherwise
    pub youtube_credentials: Option<RefreshCredentials>,
    pub audio_mix: AudioMixRecipe,
    pub min_download_bytes: u64,
    pub min_music_bytes: u64,
    pub job_timeout: Option<Duration>,
    pub ffmpeg_timeout: Option<Duration>,
    /// Directory for ffmpeg debug reports of the composition pass
    pub ffmpeg_report_dir: Option<PathBuf>,
    /// Parent of the per-job temporary directory (system temp dir when unset)
    pub work_dir: Option<PathBuf>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            asset_source: AssetSourceKind::default(),
            assets_bucket: None,
            assets_prefix: DEFAULT_ASSETS_PREFIX.to_string(),
            assets_mount_dir: None,
            object_store: ObjectStoreConfig::default(),
            drive_output_folder_id: None,
            skip_drive_upload: false,
            outputs_bucket: None,
            outputs_prefix: None,
            youtube_credentials: None,
            audio_mix: AudioMixRecipe::default(),
            min_download_bytes: DEFAULT_MIN_DOWNLOAD_BYTES,
            min_music_bytes: DEFAULT_MIN_MUSIC_BYTES,
            job_timeout: None,
            ffmpeg_timeout: None,
            ffmpeg_report_dir: None,
            work_dir: None,
        }
    }
}

impl JobConfig {
    /// Create config from environment variables.
    pub fn from_env() -> JobResult<Self> {
        let asset_source = match env_string("ASSET_SOURCE") {
            Some(s) => s.parse()?,
            None => AssetSourceKind::default(),
        };

        let audio_mix = match env_string("AUDIO_MIX") {
            Some(s) => s.parse().map_err(JobError::config)?,
            None => AudioMixRecipe::default(),
        };

        let youtube_credentials = match (
            env_string("YOUTUBE_CLIENT_ID"),
            env_string("YOUTUBE_CLIENT_SECRET"),
            env_string("YOUTUBE_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(RefreshCredentials {
                client_id,
                client_secret,
                refresh_token,
            }),
            (None, None, None) => None,
            _ => {
                return Err(JobError::config(
                    "YOUTUBE_CLIENT_ID, YOUTUBE_CLIENT_SECRET and YOUTUBE_REFRESH_TOKEN must be set together",
                ))
            }
        };

        let ffmpeg_report_dir = env_string("FFMPEG_REPORT_DIR")
            .map(PathBuf::from)
            .or_else(|| env_flag("FFMPEG_DEBUG_REPORT").then(|| PathBuf::from(".")));

        Ok(Self {
            asset_source,
            assets_bucket: env_string("GCS_ASSETS_BUCKET"),
            assets_prefix: env_string("ASSETS_PREFIX")
                .unwrap_or_else(|| DEFAULT_ASSETS_PREFIX.to_string()),
            assets_mount_dir: env_string("ASSETS_MOUNT_DIR").map(PathBuf::from),
            object_store: ObjectStoreConfig::from_env(),
            drive_output_folder_id: env_string("DRIVE_OUTPUT_FOLDER_ID"),
            skip_drive_upload: env_flag("SKIP_DRIVE_UPLOAD"),
            outputs_bucket: env_string("GCS_OUTPUTS_BUCKET"),
            outputs_prefix: env_string("GCS_OUTPUTS_PREFIX"),
            youtube_credentials,
            audio_mix,
            min_download_bytes: env_parse("MIN_DOWNLOAD_BYTES")?
                .unwrap_or(DEFAULT_MIN_DOWNLOAD_BYTES),
            min_music_bytes: env_parse("MIN_MUSIC_BYTES")?.unwrap_or(DEFAULT_MIN_MUSIC_BYTES),
            job_timeout: env_parse("JOB_TIMEOUT_SECS")?.map(Duration::from_secs),
            ffmpeg_timeout: env_parse("FFMPEG_TIMEOUT_SECS")?.map(Duration::from_secs),
            ffmpeg_report_dir,
            work_dir: env_string("WORK_DIR").map(PathBuf::from),
        })
    }

    /// Fail fast on configurations that would break mid-job.
    pub fn validate(&self) -> JobResult<()> {
        match self.asset_source {
            AssetSourceKind::ObjectStore if self.assets_bucket.is_none() => {
                return Err(JobError::config(
                    "GCS_ASSETS_BUCKET is required when ASSET_SOURCE=object_store",
                ));
            }
            AssetSourceKind::Mounted if self.assets_mount_dir.is_none() => {
                return Err(JobError::config(
                    "ASSETS_MOUNT_DIR is required when ASSET_SOURCE=mounted",
                ));
            }
            _ => {}
        }

        if self.drive_upload_enabled() && self.drive_output_folder_id.is_none() {
            return Err(JobError::config(
                "DRIVE_OUTPUT_FOLDER_ID is required unless SKIP_DRIVE_UPLOAD=1",
            ));
        }

        if self.outputs_bucket.is_some() != self.outputs_prefix.is_some() {
            return Err(JobError::config(
                "GCS_OUTPUTS_BUCKET and GCS_OUTPUTS_PREFIX must be set together",
            ));
        }

        if self.min_download_bytes == 0 || self.min_music_bytes == 0 {
            return Err(JobError::config("minimum download sizes must be positive"));
        }

        Ok(())
    }

    pub fn drive_upload_enabled(&self) -> bool {
        !self.skip_drive_upload
    }

    /// Output bucket and prefix when the object-store sink is enabled.
    pub fn object_store_output(&self) -> Option<(&str, &str)> {
        match (&self.outputs_bucket, &self.outputs_prefix) {
            (Some(bucket), Some(prefix)) => Some((bucket, prefix)),
            _ => None,
        }
    }
}

/// Non-empty environment variable.
fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    env_string(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn env_parse<T: FromStr>(name: &str) -> JobResult<Option<T>> {
    env_string(name)
        .map(|v| {
            v.parse()
                .map_err(|_| JobError::config(format!("{} has an invalid value: {}", name, v)))
        })
        .transpose()
}

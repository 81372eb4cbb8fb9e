//! Input acquisition.
//!
//! The main clip comes from Drive; background, outro and music come from the
//! asset bucket or a mounted directory. Every input is validated on disk
//! before the first ffmpeg invocation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use vcompose_google::DriveClient;
use vcompose_models::{AcquiredAssets, AssetKind, MediaAsset};
use vcompose_storage::{object_key, ObjectStoreClient};

use crate::config::JobConfig;
use crate::error::{JobError, JobResult};

/// Fetches the main clip by Drive file id.
#[async_trait]
pub trait MainClipSource: Send + Sync {
    /// Write the clip to `dest`, returning bytes written.
    async fn fetch(&self, file_id: &str, dest: &Path) -> JobResult<u64>;
}

#[async_trait]
impl MainClipSource for DriveClient {
    async fn fetch(&self, file_id: &str, dest: &Path) -> JobResult<u64> {
        Ok(self.download_file(file_id, dest).await?)
    }
}

/// Provides the fixed assets.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Make `kind` available locally and return its path.
    async fn fetch(&self, kind: AssetKind, work_dir: &Path) -> JobResult<PathBuf>;

    /// Where `kind` lives, for error messages.
    fn location(&self, kind: AssetKind) -> String;
}

/// Fixed assets downloaded from `<bucket>/<prefix>/<file name>`.
pub struct ObjectStoreAssets {
    client: ObjectStoreClient,
    prefix: String,
}

impl ObjectStoreAssets {
    pub fn new(client: ObjectStoreClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn key(&self, kind: AssetKind) -> String {
        object_key(&self.prefix, kind.file_name())
    }
}

#[async_trait]
impl AssetSource for ObjectStoreAssets {
    async fn fetch(&self, kind: AssetKind, work_dir: &Path) -> JobResult<PathBuf> {
        let key = self.key(kind);
        let dest = work_dir.join(kind.file_name());

        match self.client.download_file(&key, &dest).await {
            Ok(_) => Ok(dest),
            Err(e) if e.is_not_found() => Err(JobError::asset_missing(
                kind.file_name(),
                self.client.locator(&key),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self, kind: AssetKind) -> String {
        self.client.locator(&self.key(kind))
    }
}

/// Fixed assets read in place from a mounted directory.
#[derive(Debug, Clone)]
pub struct MountedAssets {
    dir: PathBuf,
}

impl MountedAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl AssetSource for MountedAssets {
    async fn fetch(&self, kind: AssetKind, _work_dir: &Path) -> JobResult<PathBuf> {
        Ok(self.dir.join(kind.file_name()))
    }

    fn location(&self, kind: AssetKind) -> String {
        self.dir.join(kind.file_name()).display().to_string()
    }
}

/// Minimum plausible sizes of acquired files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeFloor {
    pub video: u64,
    pub music: u64,
}

impl SizeFloor {
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            video: config.min_download_bytes,
            music: config.min_music_bytes,
        }
    }

    pub fn for_kind(&self, kind: AssetKind) -> u64 {
        if kind.is_video() {
            self.video
        } else {
            self.music
        }
    }
}

/// Fetch the main clip, then the fixed assets, and validate all four.
pub async fn acquire_all(
    main_source: &dyn MainClipSource,
    file_id: &str,
    assets: &dyn AssetSource,
    work_dir: &Path,
    floor: SizeFloor,
) -> JobResult<AcquiredAssets> {
    let main_path = work_dir.join(AssetKind::Main.file_name());
    let written = main_source.fetch(file_id, &main_path).await?;
    check_download(&main_path, written, floor.video)?;

    let (background, outro, music) = tokio::try_join!(
        acquire_fixed(assets, AssetKind::Background, work_dir, floor),
        acquire_fixed(assets, AssetKind::Outro, work_dir, floor),
        acquire_fixed(assets, AssetKind::Music, work_dir, floor),
    )?;

    info!(file_id, "All inputs acquired");

    Ok(AcquiredAssets {
        main: MediaAsset::new(AssetKind::Main, main_path),
        background,
        outro,
        music,
    })
}

async fn acquire_fixed(
    source: &dyn AssetSource,
    kind: AssetKind,
    work_dir: &Path,
    floor: SizeFloor,
) -> JobResult<MediaAsset> {
    let path = source.fetch(kind, work_dir).await?;
    validate_asset(kind, &path, &source.location(kind), floor.for_kind(kind)).await?;
    debug!(asset = %kind, path = %path.display(), "Asset ready");
    Ok(MediaAsset::new(kind, path))
}

/// A fixed asset must exist, be non-empty and clear the size floor.
pub async fn validate_asset(
    kind: AssetKind,
    path: &Path,
    location: &str,
    min_bytes: u64,
) -> JobResult<u64> {
    let len = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return Err(JobError::asset_missing(kind.file_name(), location)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(JobError::asset_missing(kind.file_name(), location))
        }
        Err(e) => return Err(e.into()),
    };

    if len == 0 {
        return Err(JobError::asset_missing(kind.file_name(), location));
    }
    check_download(path, len, min_bytes)
}

/// Reject downloads below the floor; they are usually error pages or truncations.
pub fn check_download(path: &Path, bytes: u64, min_bytes: u64) -> JobResult<u64> {
    if bytes < min_bytes {
        return Err(JobError::EmptyOrCorruptDownload {
            path: path.to_path_buf(),
            bytes,
            min_bytes,
        });
    }
    Ok(bytes)
}

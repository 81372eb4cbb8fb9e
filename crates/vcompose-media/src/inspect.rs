//! Media inspection helpers over a [`MediaExecutor`].

use std::path::Path;

use vcompose_models::{MediaAsset, MediaInfo};

use crate::error::MediaResult;
use crate::executor::MediaExecutor;

/// Width and height of the first video stream.
pub async fn get_resolution(exec: &dyn MediaExecutor, path: &Path) -> MediaResult<(u32, u32)> {
    exec.probe(path).await?.resolution(path)
}

pub async fn has_audio_stream(exec: &dyn MediaExecutor, path: &Path) -> MediaResult<bool> {
    Ok(exec.probe(path).await?.has_audio())
}

/// Container duration in seconds, `0.0` when unavailable.
pub async fn get_duration(exec: &dyn MediaExecutor, path: &Path) -> MediaResult<f64> {
    Ok(exec.probe(path).await?.duration_secs())
}

/// Probe once into [`MediaInfo`].
///
/// Audio-only assets get a zero geometry instead of a `NoVideoStream` error.
pub async fn probe_info(exec: &dyn MediaExecutor, asset: &MediaAsset) -> MediaResult<MediaInfo> {
    let probe = exec.probe(asset.path()).await?;

    let (width, height) = if asset.kind.is_video() {
        probe.resolution(asset.path())?
    } else {
        (0, 0)
    };

    Ok(MediaInfo {
        width,
        height,
        has_audio: probe.has_audio(),
        duration: probe.duration_secs(),
    })
}

/// Probe and attach the result to a copy of the asset.
pub async fn inspect(exec: &dyn MediaExecutor, asset: &MediaAsset) -> MediaResult<MediaAsset> {
    let info = probe_info(exec, asset).await?;
    Ok(asset.clone().with_info(info))
}

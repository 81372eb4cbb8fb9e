//! Seam between pipeline stages and the external ffmpeg/ffprobe binaries.

use async_trait::async_trait;
use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::{probe_streams, StreamProbe};

/// Runs ffmpeg commands and probes media files.
///
/// Stages only build [`FfmpegCommand`]s; the executor decides how they run.
#[async_trait]
pub trait MediaExecutor: Send + Sync {
    /// Run a command to completion. Non-zero exit is an error carrying the
    /// tool's captured output.
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()>;

    /// Inspect a media file's streams and duration.
    async fn probe(&self, path: &Path) -> MediaResult<StreamProbe>;
}

#[async_trait]
impl MediaExecutor for FfmpegRunner {
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        FfmpegRunner::run(self, cmd).await
    }

    async fn probe(&self, path: &Path) -> MediaResult<StreamProbe> {
        probe_streams(path).await
    }
}

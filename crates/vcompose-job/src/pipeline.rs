//! The assembly job: acquire, compose, publish.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::Instrument;

use vcompose_google::{
    build_http_client, AccessTokenSource, DriveClient, RefreshTokenSource, TokenCache,
    YouTubeClient, DRIVE_SCOPES, YOUTUBE_SCOPES,
};
use vcompose_media::{check_ffmpeg, check_ffprobe, Compositor, FfmpegRunner, MediaExecutor};
use vcompose_models::{extract_drive_id, JobRequest};
use vcompose_storage::ObjectStoreClient;

use crate::acquisition::{acquire_all, AssetSource, MainClipSource, MountedAssets, ObjectStoreAssets, SizeFloor};
use crate::config::{AssetSourceKind, JobConfig};
use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;
use crate::publish::{publish, PublicationReport, Sinks};

/// Runs one job end to end against injected collaborators.
pub struct JobRunner {
    config: JobConfig,
    exec: Arc<dyn MediaExecutor>,
    main_source: Arc<dyn MainClipSource>,
    assets: Arc<dyn AssetSource>,
    sinks: Sinks,
}

impl JobRunner {
    pub fn new(
        config: JobConfig,
        exec: Arc<dyn MediaExecutor>,
        main_source: Arc<dyn MainClipSource>,
        assets: Arc<dyn AssetSource>,
        sinks: Sinks,
    ) -> Self {
        Self {
            config,
            exec,
            main_source,
            assets,
            sinks,
        }
    }

    /// Wire the real ffmpeg, Google and object-store clients from config.
    ///
    /// The hosting-platform client is only built when `request` asks for it.
    pub async fn from_config(config: JobConfig, request: &JobRequest) -> JobResult<Self> {
        config.validate()?;
        check_ffmpeg()?;
        check_ffprobe()?;

        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = config.ffmpeg_timeout {
            runner = runner.with_timeout(timeout.as_secs());
        }

        let http = build_http_client()?;
        let drive_tokens: Arc<dyn AccessTokenSource> =
            Arc::new(TokenCache::application_default(DRIVE_SCOPES).await?);
        let drive = Arc::new(DriveClient::new(http.clone(), drive_tokens));

        let assets: Arc<dyn AssetSource> = match config.asset_source {
            AssetSourceKind::ObjectStore => {
                let bucket = config
                    .assets_bucket
                    .clone()
                    .ok_or_else(|| JobError::config("GCS_ASSETS_BUCKET is not set"))?;
                let client = ObjectStoreClient::new(config.object_store.clone(), bucket).await?;
                Arc::new(ObjectStoreAssets::new(client, config.assets_prefix.clone()))
            }
            AssetSourceKind::Mounted => {
                let dir = config
                    .assets_mount_dir
                    .clone()
                    .ok_or_else(|| JobError::config("ASSETS_MOUNT_DIR is not set"))?;
                Arc::new(MountedAssets::new(dir))
            }
        };

        let mut sinks = Sinks::default();
        if config.drive_upload_enabled() {
            if let Some(folder_id) = &config.drive_output_folder_id {
                sinks.drive = Some((drive.clone(), folder_id.clone()));
            }
        }
        if let Some((bucket, prefix)) = config.object_store_output() {
            let client = ObjectStoreClient::new(config.object_store.clone(), bucket).await?;
            sinks.object_store = Some((Arc::new(client), prefix.to_string()));
        }
        if request.publish.is_some() {
            let tokens: Arc<dyn AccessTokenSource> = match &config.youtube_credentials {
                Some(creds) => Arc::new(RefreshTokenSource::new(http.clone(), creds.clone())),
                None => Arc::new(TokenCache::application_default(YOUTUBE_SCOPES).await?),
            };
            sinks.video = Some(Arc::new(YouTubeClient::new(http, tokens)));
        }

        Ok(Self::new(config, Arc::new(runner), drive, assets, sinks))
    }

    /// Run the job, bounded by the configured job timeout.
    ///
    /// Acquisition and composition failures are fatal. Publication failures
    /// are collected in the returned report.
    pub async fn run(&self, request: &JobRequest) -> JobResult<PublicationReport> {
        let logger = JobLogger::new(&request.job_id, "job");
        let span = logger.create_span();

        let job = self.run_inner(request, &logger).instrument(span);
        match self.config.job_timeout {
            Some(limit) => tokio::time::timeout(limit, job)
                .await
                .map_err(|_| JobError::Timeout(limit.as_secs()))?,
            None => job.await,
        }
    }

    async fn run_inner(&self, request: &JobRequest, logger: &JobLogger) -> JobResult<PublicationReport> {
        let started = Instant::now();
        logger.log_start(&format!("source {}", request.source));

        let drive_id = extract_drive_id(&request.source)?;
        let work_dir = self.job_dir()?;
        let dir = work_dir.path();

        let acquire = logger.stage("acquire");
        acquire.log_start(&format!("drive file {}", drive_id));
        let assets = acquire_all(
            self.main_source.as_ref(),
            &drive_id,
            self.assets.as_ref(),
            dir,
            SizeFloor::from_config(&self.config),
        )
        .await
        .inspect_err(|e| acquire.log_error(&e.to_string()))?;
        acquire.log_completion("inputs validated");

        let compose = logger.stage("compose");
        compose.log_start(&format!("recipe {}", self.config.audio_mix));
        let artifact = self
            .compositor(dir)
            .compose(&assets)
            .await
            .map_err(JobError::from)
            .inspect_err(|e| compose.log_error(&e.to_string()))?;
        compose.log_completion(&format!("{:.1}s artifact", artifact.duration));

        let publish_logger = logger.stage("publish");
        let report = publish(
            &self.sinks,
            &artifact,
            &request.output_name,
            request.publish.as_ref(),
            &publish_logger,
        )
        .await;

        if report.is_success() {
            logger.log_completion(&format!(
                "{} sink(s) in {:.1}s",
                report.result.published_count(),
                started.elapsed().as_secs_f64()
            ));
        } else {
            logger.log_warning(&format!("{} sink(s) failed", report.failures.len()));
        }

        // Intermediates are removed when `work_dir` drops
        Ok(report)
    }

    fn compositor(&self, dir: &Path) -> Compositor {
        let compositor = Compositor::new(self.exec.clone(), dir).with_recipe(self.config.audio_mix);
        match &self.config.ffmpeg_report_dir {
            Some(report_dir) => compositor.with_debug_report(report_dir),
            None => compositor,
        }
    }

    fn job_dir(&self) -> JobResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vcompose-");
        let dir = match &self.config.work_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::ObjectPublisher;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use vcompose_media::testing::RecordingExecutor;
    use vcompose_media::StreamProbe;
    use vcompose_models::AssetKind;

    const DRIVE_ID: &str = "1a2B3c4D5e6F7g8H9i0JkLmNoP";

    struct FakeDrive {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MainClipSource for FakeDrive {
        async fn fetch(&self, _file_id: &str, dest: &Path) -> JobResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(dest, vec![0u8; 4096]).await?;
            Ok(4096)
        }
    }

    #[derive(Default)]
    struct FakeStore {
        stored: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl ObjectPublisher for FakeStore {
        async fn store(&self, path: &Path, key: &str) -> JobResult<String> {
            self.stored
                .lock()
                .unwrap()
                .push((key.to_string(), path.exists()));
            Ok(format!("gs://outputs/{}", key))
        }
    }

    fn config(mount: &Path, work: &Path) -> JobConfig {
        JobConfig {
            asset_source: AssetSourceKind::Mounted,
            assets_mount_dir: Some(mount.to_path_buf()),
            skip_drive_upload: true,
            outputs_bucket: Some("outputs".to_string()),
            outputs_prefix: Some("final".to_string()),
            min_download_bytes: 1024,
            min_music_bytes: 16,
            work_dir: Some(work.to_path_buf()),
            ..Default::default()
        }
    }

    fn mount_assets(dir: &Path, skip: Option<AssetKind>) {
        for kind in AssetKind::FIXED {
            if Some(kind) != skip {
                std::fs::write(dir.join(kind.file_name()), vec![1u8; 2048]).unwrap();
            }
        }
    }

    fn scenario() -> RecordingExecutor {
        RecordingExecutor::new()
            .with_probe("main.mp4", StreamProbe::video(500, 800).with_duration(60.0))
            .with_probe("background.mp4", StreamProbe::video(1920, 1080).with_duration(300.0))
            .with_probe("outro.mp4", StreamProbe::video(1920, 1080).with_audio().with_duration(10.0))
            .with_probe("music.mp3", StreamProbe::audio_only().with_duration(30.0))
    }

    struct Harness {
        exec: Arc<RecordingExecutor>,
        drive: Arc<FakeDrive>,
        store: Arc<FakeStore>,
        runner: JobRunner,
    }

    fn harness(config: JobConfig, exec: RecordingExecutor) -> Harness {
        let exec = Arc::new(exec);
        let drive = Arc::new(FakeDrive {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(FakeStore::default());
        let mount = config.assets_mount_dir.clone().unwrap();
        let sinks = Sinks {
            object_store: Some((store.clone(), "final".to_string())),
            ..Default::default()
        };
        let runner = JobRunner::new(
            config,
            exec.clone(),
            drive.clone(),
            Arc::new(MountedAssets::new(mount)),
            sinks,
        );
        Harness {
            exec,
            drive,
            store,
            runner,
        }
    }

    #[tokio::test]
    async fn test_job_end_to_end() {
        let mount = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        mount_assets(mount.path(), None);

        let h = harness(config(mount.path(), work.path()), scenario());
        let request = JobRequest::new(
            format!("https://drive.google.com/file/d/{}/view", DRIVE_ID),
            "final.mp4",
        );

        let report = h.runner.run(&request).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.result.published_count(), 1);
        assert_eq!(
            report.result.gcs.as_deref(),
            Some("gs://outputs/final/final_output.mp4")
        );
        assert!(report.result.drive.is_none());
        assert!(report.result.youtube.is_none());

        // The artifact existed at upload time
        let stored = h.store.stored.lock().unwrap().clone();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].1);

        assert_eq!(h.drive.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.exec.output_names().last().map(String::as_str),
            Some("final_output.mp4")
        );

        // Job directory is cleaned up
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_background_fails_before_ffmpeg() {
        let mount = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        mount_assets(mount.path(), Some(AssetKind::Background));

        let h = harness(config(mount.path(), work.path()), scenario());
        let err = h
            .runner
            .run(&JobRequest::new(DRIVE_ID, "final.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::AssetMissingOrEmpty { ref asset, .. } if asset == "background.mp4"));
        assert_eq!(h.exec.run_count(), 0);
        assert!(h.store.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_source_fails_before_download() {
        let mount = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        mount_assets(mount.path(), None);

        let h = harness(config(mount.path(), work.path()), scenario());
        let err = h
            .runner
            .run(&JobRequest::new("https://example.com/video.mp4", "final.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::InvalidIdentifier(_)));
        assert_eq!(h.drive.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.exec.run_count(), 0);
    }

    #[tokio::test]
    async fn test_ffmpeg_failure_aborts_without_publishing() {
        let mount = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        mount_assets(mount.path(), None);

        let exec = scenario().fail_output("composed_video.mp4", "Invalid filter graph");
        let h = harness(config(mount.path(), work.path()), exec);
        let err = h
            .runner
            .run(&JobRequest::new(DRIVE_ID, "final.mp4"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Invalid filter graph"));
        assert!(h.store.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_requested_without_platform_is_reported() {
        let mount = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        mount_assets(mount.path(), None);

        let h = harness(config(mount.path(), work.path()), scenario());
        let request = JobRequest::new(DRIVE_ID, "final.mp4").with_publish("Recap", "", None);
        let report = h.runner.run(&request).await.unwrap();

        assert!(report.result.gcs.is_some());
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_success());
    }

    struct SlowDrive;

    #[async_trait]
    impl MainClipSource for SlowDrive {
        async fn fetch(&self, _file_id: &str, _dest: &Path) -> JobResult<u64> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_job_timeout() {
        let mount = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        mount_assets(mount.path(), None);

        let config = JobConfig {
            job_timeout: Some(Duration::from_millis(50)),
            ..config(mount.path(), work.path())
        };
        let runner = JobRunner::new(
            config,
            Arc::new(scenario()),
            Arc::new(SlowDrive),
            Arc::new(MountedAssets::new(mount.path())),
            Sinks::default(),
        );

        let err = runner.run(&JobRequest::new(DRIVE_ID, "final.mp4")).await.unwrap_err();
        assert!(matches!(err, JobError::Timeout(_)));
    }
}

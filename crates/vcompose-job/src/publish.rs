//! Publication of the composed artifact.
//!
//! Each configured sink is attempted independently. A sink failure is logged
//! and recorded but does not stop the remaining sinks.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use vcompose_google::{DriveClient, YouTubeClient};
use vcompose_models::{ComposedArtifact, DriveFile, HostedVideo, PublicationResult, PublishRequest};
use vcompose_storage::{object_key, ObjectStoreClient};

use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;

pub const VIDEO_MIME: &str = "video/mp4";
const FALLBACK_STEM: &str = "final_output";

#[async_trait]
pub trait DrivePublisher: Send + Sync {
    async fn upload(&self, path: &Path, name: &str, folder_id: &str) -> JobResult<DriveFile>;
}

#[async_trait]
impl DrivePublisher for DriveClient {
    async fn upload(&self, path: &Path, name: &str, folder_id: &str) -> JobResult<DriveFile> {
        Ok(self.upload_file(path, name, folder_id, VIDEO_MIME).await?)
    }
}

#[async_trait]
pub trait ObjectPublisher: Send + Sync {
    /// Store the file under `key`, returning its locator.
    async fn store(&self, path: &Path, key: &str) -> JobResult<String>;
}

#[async_trait]
impl ObjectPublisher for ObjectStoreClient {
    async fn store(&self, path: &Path, key: &str) -> JobResult<String> {
        Ok(self.upload_file(path, key, VIDEO_MIME).await?)
    }
}

#[async_trait]
pub trait VideoPublisher: Send + Sync {
    async fn publish(&self, path: &Path, request: &PublishRequest) -> JobResult<HostedVideo>;
}

#[async_trait]
impl VideoPublisher for YouTubeClient {
    async fn publish(&self, path: &Path, request: &PublishRequest) -> JobResult<HostedVideo> {
        Ok(self
            .publish_video(
                path,
                &request.title,
                &request.description,
                request.thumbnail.as_deref(),
            )
            .await?)
    }
}

/// The sinks enabled for this run.
#[derive(Default, Clone)]
pub struct Sinks {
    /// Drive publisher and output folder id
    pub drive: Option<(Arc<dyn DrivePublisher>, String)>,
    /// Object-store publisher and output prefix
    pub object_store: Option<(Arc<dyn ObjectPublisher>, String)>,
    pub video: Option<Arc<dyn VideoPublisher>>,
}

/// Outcome of publication: per-sink results plus the failures that were tolerated.
#[derive(Debug, Default)]
pub struct PublicationReport {
    pub result: PublicationResult,
    pub failures: Vec<JobError>,
}

impl PublicationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Object key for the artifact: the id of the file uploaded to Drive when
/// there is one, the artifact stem otherwise.
pub fn output_key(prefix: &str, uploaded_id: Option<&str>, artifact: &ComposedArtifact) -> String {
    let stem = uploaded_id
        .or_else(|| artifact.stem())
        .unwrap_or(FALLBACK_STEM);
    object_key(prefix, &format!("{}.mp4", stem))
}

/// Upload the artifact to every enabled sink.
///
/// Drive runs first so the object key can reuse the uploaded file id.
/// The hosting platform is attempted only when `request` is present.
pub async fn publish(
    sinks: &Sinks,
    artifact: &ComposedArtifact,
    output_name: &str,
    request: Option<&PublishRequest>,
    logger: &JobLogger,
) -> PublicationReport {
    let mut report = PublicationReport::default();
    let path = artifact.path();

    if let Some((drive, folder_id)) = &sinks.drive {
        match drive.upload(path, output_name, folder_id).await {
            Ok(file) => {
                logger.log_progress(&format!("Uploaded to Drive as {}", file.id));
                report.result.drive = Some(file);
            }
            Err(e) => record_failure(&mut report, logger, "drive", e),
        }
    }

    if let Some((store, prefix)) = &sinks.object_store {
        let uploaded_id = report.result.drive.as_ref().map(|f| f.id.as_str());
        let key = output_key(prefix, uploaded_id, artifact);
        match store.store(path, &key).await {
            Ok(locator) => {
                logger.log_progress(&format!("Stored artifact at {}", locator));
                report.result.gcs = Some(locator);
            }
            Err(e) => record_failure(&mut report, logger, "object_store", e),
        }
    }

    if let Some(request) = request {
        match &sinks.video {
            Some(video) => match video.publish(path, request).await {
                Ok(hosted) => {
                    logger.log_progress(&format!("Published {}", hosted.url));
                    report.result.youtube = Some(hosted);
                }
                Err(e) => record_failure(&mut report, logger, "youtube", e),
            },
            None => record_failure(
                &mut report,
                logger,
                "youtube",
                JobError::config("no hosting-platform publisher configured"),
            ),
        }
    }

    report
}

fn record_failure(report: &mut PublicationReport, logger: &JobLogger, sink: &str, err: JobError) {
    logger.log_error(&format!("{} upload failed: {}", sink, err));
    report.failures.push(JobError::publication(sink, err));
}

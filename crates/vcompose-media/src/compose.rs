//! Video composition and final mux.

use std::path::{Path, PathBuf};
use tracing::info;

use vcompose_models::{CanonicalFrame, ComposedArtifact, EncodingProfile, MediaAsset};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::executor::MediaExecutor;
use crate::filters::{overlay_concat_graph, VIDEO_OUT};
use crate::probe::StreamKind;

pub const COMPOSED_VIDEO: &str = "composed_video.mp4";
pub const FINAL_OUTPUT: &str = "final_output.mp4";

/// Allowed drift between the artifact and the composed video, in seconds.
pub const DURATION_TOLERANCE: f64 = 1.0;

/// Overlay the main clip on the background and append the outro.
///
/// All three inputs must already share the canonical frame. Output is video only.
pub async fn compose_video(
    exec: &dyn MediaExecutor,
    main: &MediaAsset,
    background: &MediaAsset,
    outro: &MediaAsset,
    output: &Path,
    report_dir: Option<&Path>,
) -> MediaResult<MediaAsset> {
    let mut cmd = FfmpegCommand::new(main.path(), output)
        .input(background.path())
        .input(outro.path())
        .filter_complex(overlay_concat_graph())
        .map(VIDEO_OUT)
        .video_encoding(&EncodingProfile::program())
        .no_audio();

    if let Some(dir) = report_dir {
        cmd = cmd.debug_report(dir);
    }

    info!(output = %output.display(), "Composing video graph");
    exec.run(&cmd).await?;
    Ok(main.derived(output))
}

/// Stream-copy the composed video and program audio into one container.
pub async fn mux(
    exec: &dyn MediaExecutor,
    video: &MediaAsset,
    audio: &MediaAsset,
    output: &Path,
) -> MediaResult<PathBuf> {
    let cmd = FfmpegCommand::new(video.path(), output)
        .input(audio.path())
        .map("0:v:0")
        .map("1:a:0")
        .codec_copy();

    exec.run(&cmd).await.map_err(MediaError::mux)?;
    Ok(output.to_path_buf())
}

/// Check the muxed file has exactly one video and one audio stream and runs
/// as long as the composed video.
///
/// A non-positive `expected_duration` skips the length check.
pub async fn verify_artifact(
    exec: &dyn MediaExecutor,
    path: &Path,
    frame: CanonicalFrame,
    expected_duration: f64,
) -> MediaResult<ComposedArtifact> {
    let probe = exec.probe(path).await?;

    let video = probe.count(StreamKind::Video);
    let audio = probe.count(StreamKind::Audio);
    if video != 1 || audio != 1 {
        return Err(MediaError::InvalidArtifact(format!(
            "expected 1 video and 1 audio stream, found {} video and {} audio",
            video, audio
        )));
    }

    let (width, height) = probe.resolution(path)?;
    if !frame.matches(width, height) {
        return Err(MediaError::InvalidArtifact(format!(
            "expected {} frame, found {}x{}",
            frame, width, height
        )));
    }

    let duration = probe.duration_secs();
    if expected_duration > 0.0 && (duration - expected_duration).abs() > DURATION_TOLERANCE {
        return Err(MediaError::InvalidArtifact(format!(
            "expected a {:.1}s artifact to match the video timeline, found {:.1}s",
            expected_duration, duration
        )));
    }

    Ok(ComposedArtifact {
        path: path.to_path_buf(),
        duration,
        frame,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StreamProbe;
    use crate::testing::RecordingExecutor;
    use vcompose_models::AssetKind;

    #[tokio::test]
    async fn test_compose_video_inputs_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new()
            .with_probe("main_1080.mp4", StreamProbe::video(1920, 1080).with_audio().with_duration(60.0))
            .with_probe("background_1080.mp4", StreamProbe::video(1920, 1080).with_duration(120.0))
            .with_probe("outro_1080.mp4", StreamProbe::video(1920, 1080).with_audio().with_duration(10.0));

        let main = MediaAsset::new(AssetKind::Main, dir.path().join("main_1080.mp4"));
        let bg = MediaAsset::new(AssetKind::Background, dir.path().join("background_1080.mp4"));
        let outro = MediaAsset::new(AssetKind::Outro, dir.path().join("outro_1080.mp4"));
        let reports = dir.path().join("reports");

        let video = compose_video(&exec, &main, &bg, &outro, &dir.path().join(COMPOSED_VIDEO), Some(&reports))
            .await
            .unwrap();

        let cmd = exec.command_for(COMPOSED_VIDEO).unwrap();
        let sources: Vec<_> = cmd.inputs().iter().map(|i| i.source.clone()).collect();
        assert_eq!(sources, vec![main.path, bg.path, outro.path]);
        assert_eq!(cmd.maps(), vec!["[vout]"]);
        assert!(cmd.has_output_arg("-an"));
        assert_eq!(cmd.report_dir(), Some(reports.as_path()));

        let probe = exec.probe(video.path()).await.unwrap();
        assert_eq!(probe.duration, Some(70.0));
        assert!(!probe.has_audio());
    }

    #[tokio::test]
    async fn test_mux_failure_is_mux_error() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new().fail_output(
            FINAL_OUTPUT,
            "Could not find tag for codec pcm_s16le in stream #1",
        );

        let video = MediaAsset::new(AssetKind::Main, dir.path().join(COMPOSED_VIDEO));
        let audio = MediaAsset::new(AssetKind::Music, dir.path().join("composed_audio.m4a"));

        let err = mux(&exec, &video, &audio, &dir.path().join(FINAL_OUTPUT))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Mux { .. }));

        let cmd = exec.command_for(FINAL_OUTPUT).unwrap();
        assert_eq!(cmd.maps(), vec!["0:v:0", "1:a:0"]);
        assert_eq!(cmd.output_value("-c:v"), Some("copy"));
        assert_eq!(cmd.output_value("-c:a"), Some("copy"));
    }

    #[tokio::test]
    async fn test_verify_rejects_missing_audio() {
        let exec = RecordingExecutor::new()
            .with_probe("final_output.mp4", StreamProbe::video(1920, 1080).with_duration(70.0));

        let err = verify_artifact(&exec, Path::new("/job/final_output.mp4"), CanonicalFrame::HD_1080, 70.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidArtifact(_)));
    }

    #[tokio::test]
    async fn test_verify_accepts_single_pair() {
        let exec = RecordingExecutor::new().with_probe(
            "final_output.mp4",
            StreamProbe::video(1920, 1080).with_audio().with_duration(70.2),
        );

        let artifact = verify_artifact(&exec, Path::new("/job/final_output.mp4"), CanonicalFrame::HD_1080, 70.0)
            .await
            .unwrap();
        assert_eq!(artifact.duration, 70.2);
        assert_eq!(artifact.stem(), Some("final_output"));
    }

    #[tokio::test]
    async fn test_verify_rejects_audio_past_video() {
        // Music tail outlasting the outro leaves the stream copy longer than the video
        let exec = RecordingExecutor::new().with_probe(
            "final_output.mp4",
            StreamProbe::video(1920, 1080).with_audio().with_duration(72.0),
        );

        let err = verify_artifact(&exec, Path::new("/job/final_output.mp4"), CanonicalFrame::HD_1080, 70.0)
            .await
            .unwrap_err();
        match err {
            MediaError::InvalidArtifact(msg) => assert!(msg.contains("72.0s")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_verify_without_expected_duration() {
        let exec = RecordingExecutor::new().with_probe(
            "final_output.mp4",
            StreamProbe::video(1920, 1080).with_audio().with_duration(72.0),
        );

        let artifact = verify_artifact(&exec, Path::new("/job/final_output.mp4"), CanonicalFrame::HD_1080, 0.0)
            .await
            .unwrap();
        assert_eq!(artifact.duration, 72.0);
    }
}

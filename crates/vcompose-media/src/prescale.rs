//! Background and outro pre-scaling.
//!
//! Both fixed video assets are re-encoded into the canonical frame with the
//! cheaper asset profile. The background loses its audio; the outro keeps it.

use std::path::Path;
use tracing::info;

use vcompose_models::{CanonicalFrame, EncodingProfile, MediaAsset};

use crate::error::MediaResult;
use crate::executor::MediaExecutor;
use crate::normalize::scale_to_frame;

pub const BACKGROUND_SCALED: &str = "background_1080.mp4";
pub const OUTRO_SCALED: &str = "outro_1080.mp4";

pub async fn prescale_background(
    exec: &dyn MediaExecutor,
    background: &MediaAsset,
    work_dir: &Path,
    frame: CanonicalFrame,
) -> MediaResult<MediaAsset> {
    scale_to_frame(
        exec,
        background,
        &work_dir.join(BACKGROUND_SCALED),
        frame,
        &EncodingProfile::asset(),
        false,
    )
    .await
}

pub async fn prescale_outro(
    exec: &dyn MediaExecutor,
    outro: &MediaAsset,
    work_dir: &Path,
    frame: CanonicalFrame,
) -> MediaResult<MediaAsset> {
    scale_to_frame(
        exec,
        outro,
        &work_dir.join(OUTRO_SCALED),
        frame,
        &EncodingProfile::asset(),
        true,
    )
    .await
}

/// Run both passes concurrently. The first failure wins.
pub async fn prescale_assets(
    exec: &dyn MediaExecutor,
    background: &MediaAsset,
    outro: &MediaAsset,
    work_dir: &Path,
    frame: CanonicalFrame,
) -> MediaResult<(MediaAsset, MediaAsset)> {
    info!(frame = %frame, "Pre-scaling background and outro");

    tokio::try_join!(
        prescale_background(exec, background, work_dir, frame),
        prescale_outro(exec, outro, work_dir, frame),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{get_resolution, has_audio_stream};
    use crate::probe::StreamProbe;
    use crate::testing::RecordingExecutor;
    use vcompose_models::AssetKind;

    #[tokio::test]
    async fn test_prescale_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new()
            .with_probe("background.mp4", StreamProbe::video(1280, 720).with_audio().with_duration(120.0))
            .with_probe("outro.mp4", StreamProbe::video(1920, 1080).with_audio().with_duration(10.0));

        let bg = MediaAsset::new(AssetKind::Background, dir.path().join("background.mp4"));
        let outro = MediaAsset::new(AssetKind::Outro, dir.path().join("outro.mp4"));

        let (bg, outro) = prescale_assets(&exec, &bg, &outro, dir.path(), CanonicalFrame::HD_1080)
            .await
            .unwrap();

        assert_eq!(bg.kind, AssetKind::Background);
        assert_eq!(get_resolution(&exec, bg.path()).await.unwrap(), (1920, 1080));
        assert!(!has_audio_stream(&exec, bg.path()).await.unwrap());
        assert!(has_audio_stream(&exec, outro.path()).await.unwrap());

        let bg_cmd = exec.command_for(BACKGROUND_SCALED).unwrap();
        assert_eq!(bg_cmd.output_value("-crf"), Some("22"));
        assert_eq!(bg_cmd.output_value("-preset"), Some("fast"));
        assert!(bg_cmd.has_output_arg("-an"));

        let outro_cmd = exec.command_for(OUTRO_SCALED).unwrap();
        assert_eq!(outro_cmd.output_value("-b:a"), Some("128k"));
        assert!(!outro_cmd.has_output_arg("-an"));
    }

    #[tokio::test]
    async fn test_prescale_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new()
            .with_probe("background.mp4", StreamProbe::video(1920, 1080))
            .with_probe("outro.mp4", StreamProbe::video(1920, 1080))
            .fail_output(OUTRO_SCALED, "moov atom not found");

        let bg = MediaAsset::new(AssetKind::Background, dir.path().join("background.mp4"));
        let outro = MediaAsset::new(AssetKind::Outro, dir.path().join("outro.mp4"));

        let err = prescale_assets(&exec, &bg, &outro, dir.path(), CanonicalFrame::HD_1080)
            .await
            .unwrap_err();
        assert_eq!(err.stderr(), Some("moov atom not found"));
    }
}

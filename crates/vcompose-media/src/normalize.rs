//! Main clip normalization: guaranteed audio track and canonical geometry.

use std::path::Path;
use tracing::info;

use vcompose_models::{CanonicalFrame, EncodingProfile, MediaAsset};

use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::executor::MediaExecutor;
use crate::filters::{scale_pad, silence_source};
use crate::inspect::{inspect, probe_info};

pub const MAIN_WITH_AUDIO: &str = "main_with_audio.mp4";
pub const MAIN_SCALED: &str = "main_1080.mp4";

/// Add a silent stereo track, copying the video stream untouched.
pub async fn add_silent_audio(
    exec: &dyn MediaExecutor,
    input: &MediaAsset,
    output: &Path,
) -> MediaResult<MediaAsset> {
    let cmd = FfmpegCommand::new(input.path(), output)
        .lavfi_input(silence_source())
        .map("0:v:0")
        .map("1:a:0")
        .shortest()
        .video_codec("copy")
        .audio_encoding(&EncodingProfile::program());

    exec.run(&cmd).await?;
    Ok(input.derived(output))
}

/// Re-encode into `frame` with the scale+pad recipe.
///
/// With `keep_audio` false the output carries no audio stream.
pub async fn scale_to_frame(
    exec: &dyn MediaExecutor,
    input: &MediaAsset,
    output: &Path,
    frame: CanonicalFrame,
    profile: &EncodingProfile,
    keep_audio: bool,
) -> MediaResult<MediaAsset> {
    let cmd = FfmpegCommand::new(input.path(), output)
        .video_filter(scale_pad(frame))
        .video_encoding(profile);

    let cmd = if keep_audio {
        cmd.audio_encoding(profile)
    } else {
        cmd.no_audio()
    };

    exec.run(&cmd).await?;
    Ok(input.derived(output))
}

/// Make the main clip composable: add silence if it has no audio, then
/// scale+pad if its geometry is not exactly `frame`. Either step is skipped
/// when not needed; a clip needing neither is returned as-is.
///
/// The returned asset carries fresh probe metadata.
pub async fn normalize_main(
    exec: &dyn MediaExecutor,
    main: &MediaAsset,
    work_dir: &Path,
    frame: CanonicalFrame,
) -> MediaResult<MediaAsset> {
    let info = probe_info(exec, main).await?;
    let mut current = main.clone().with_info(info);

    if !info.has_audio {
        info!(path = %main.path().display(), "Main clip has no audio, adding silent track");
        current = add_silent_audio(exec, &current, &work_dir.join(MAIN_WITH_AUDIO)).await?;
    }

    if !frame.matches(info.width, info.height) {
        info!(
            from = %format!("{}x{}", info.width, info.height),
            to = %frame,
            "Scaling main clip to canonical frame"
        );
        current = scale_to_frame(
            exec,
            &current,
            &work_dir.join(MAIN_SCALED),
            frame,
            &EncodingProfile::program(),
            true,
        )
        .await?;
    }

    if current.info.is_some() {
        return Ok(current);
    }

    let normalized = inspect(exec, &current).await?;
    if let Some(info) = normalized.info {
        info!(
            width = info.width,
            height = info.height,
            duration = info.duration,
            "Main clip normalized"
        );
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{get_resolution, has_audio_stream};
    use crate::probe::StreamProbe;
    use crate::testing::RecordingExecutor;
    use vcompose_models::AssetKind;

    const HD: CanonicalFrame = CanonicalFrame::HD_1080;

    fn main_asset(dir: &Path) -> MediaAsset {
        MediaAsset::new(AssetKind::Main, dir.join("main.mp4"))
    }

    #[tokio::test]
    async fn test_canonical_clip_with_audio_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new().with_probe(
            "main.mp4",
            StreamProbe::video(1920, 1080).with_audio().with_duration(30.0),
        );

        let out = normalize_main(&exec, &main_asset(dir.path()), dir.path(), HD)
            .await
            .unwrap();

        assert_eq!(out.path(), dir.path().join("main.mp4"));
        assert_eq!(exec.run_count(), 0);
        assert_eq!(out.info.unwrap().duration, 30.0);
    }

    #[tokio::test]
    async fn test_silent_portrait_clip_gets_audio_then_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new()
            .with_probe("main.mp4", StreamProbe::video(500, 800).with_duration(60.0));
        let main = main_asset(dir.path());

        assert!(!has_audio_stream(&exec, main.path()).await.unwrap());

        let out = normalize_main(&exec, &main, dir.path(), HD).await.unwrap();

        assert_eq!(exec.output_names(), vec![MAIN_WITH_AUDIO, MAIN_SCALED]);
        assert_eq!(out.path(), dir.path().join(MAIN_SCALED));

        let with_audio = dir.path().join(MAIN_WITH_AUDIO);
        assert!(has_audio_stream(&exec, &with_audio).await.unwrap());
        assert_eq!(get_resolution(&exec, out.path()).await.unwrap(), (1920, 1080));

        let info = out.info.unwrap();
        assert!(info.has_audio);
        assert_eq!(info.duration, 60.0);

        let silence = exec.command_for(MAIN_WITH_AUDIO).unwrap();
        assert!(silence.inputs()[1].is_lavfi());
        assert_eq!(silence.maps(), vec!["0:v:0", "1:a:0"]);
        assert_eq!(silence.output_value("-c:v"), Some("copy"));
        assert_eq!(silence.output_value("-b:a"), Some("192k"));
        assert!(silence.has_output_arg("-shortest"));

        let scale = exec.command_for(MAIN_SCALED).unwrap();
        assert_eq!(scale.inputs()[0].source, with_audio);
        assert_eq!(scale.output_value("-crf"), Some("18"));
        assert_eq!(scale.output_value("-preset"), Some("superfast"));
    }

    #[tokio::test]
    async fn test_width_mismatch_at_canonical_height_is_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new().with_probe(
            "main.mp4",
            StreamProbe::video(1440, 1080).with_audio().with_duration(12.0),
        );

        let out = normalize_main(&exec, &main_asset(dir.path()), dir.path(), HD)
            .await
            .unwrap();

        assert_eq!(exec.output_names(), vec![MAIN_SCALED]);
        let info = out.info.unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[tokio::test]
    async fn test_scale_is_stable_on_canonical_input() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new()
            .with_probe("bg.mp4", StreamProbe::video(1920, 1080).with_duration(90.0));
        let input = MediaAsset::new(AssetKind::Background, dir.path().join("bg.mp4"));

        let once = scale_to_frame(&exec, &input, &dir.path().join("once.mp4"), HD, &EncodingProfile::asset(), false)
            .await
            .unwrap();
        let twice = scale_to_frame(&exec, &once, &dir.path().join("twice.mp4"), HD, &EncodingProfile::asset(), false)
            .await
            .unwrap();

        assert_eq!(get_resolution(&exec, once.path()).await.unwrap(), (1920, 1080));
        assert_eq!(get_resolution(&exec, twice.path()).await.unwrap(), (1920, 1080));
        assert!(!has_audio_stream(&exec, twice.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_clip_without_video_fails() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new().with_probe("main.mp4", StreamProbe::audio_only());

        let err = normalize_main(&exec, &main_asset(dir.path()), dir.path(), HD)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::MediaError::NoVideoStream(_)));
        assert_eq!(exec.run_count(), 0);
    }
}

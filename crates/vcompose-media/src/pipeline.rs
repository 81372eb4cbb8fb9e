//! End-to-end composition of acquired assets into the final artifact.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use vcompose_models::{AcquiredAssets, AudioMixRecipe, CanonicalFrame, ComposedArtifact};

use crate::audio::build_program_audio;
use crate::compose::{compose_video, mux, verify_artifact, COMPOSED_VIDEO, FINAL_OUTPUT};
use crate::error::MediaResult;
use crate::executor::MediaExecutor;
use crate::inspect::get_duration;
use crate::normalize::normalize_main;
use crate::prescale::prescale_assets;

/// Runs the composition stages in order inside one job directory.
#[derive(Clone)]
pub struct Compositor {
    exec: Arc<dyn MediaExecutor>,
    work_dir: PathBuf,
    frame: CanonicalFrame,
    recipe: AudioMixRecipe,
    report_dir: Option<PathBuf>,
}

impl Compositor {
    pub fn new(exec: Arc<dyn MediaExecutor>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            exec,
            work_dir: work_dir.into(),
            frame: CanonicalFrame::default(),
            recipe: AudioMixRecipe::default(),
            report_dir: None,
        }
    }

    pub fn with_recipe(mut self, recipe: AudioMixRecipe) -> Self {
        self.recipe = recipe;
        self
    }

    /// Write an ffmpeg debug report for the video composition pass.
    pub fn with_debug_report(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Normalize, pre-scale, compose video, build audio, mux, verify.
    pub async fn compose(&self, assets: &AcquiredAssets) -> MediaResult<ComposedArtifact> {
        let exec = self.exec.as_ref();
        let dir = self.work_dir.as_path();
        let started = Instant::now();

        let main = normalize_main(exec, &assets.main, dir, self.frame).await?;

        let (background, outro) =
            prescale_assets(exec, &assets.background, &assets.outro, dir, self.frame).await?;

        let video = compose_video(
            exec,
            &main,
            &background,
            &outro,
            &dir.join(COMPOSED_VIDEO),
            self.report_dir.as_deref(),
        )
        .await?;

        let outro_duration = get_duration(exec, outro.path()).await?;
        let audio =
            build_program_audio(exec, &main, &assets.music, self.recipe, outro_duration, dir).await?;

        let output = mux(exec, &video, &audio, &dir.join(FINAL_OUTPUT)).await?;
        let video_duration = get_duration(exec, video.path()).await?;
        let artifact = verify_artifact(exec, &output, self.frame, video_duration).await?;

        info!(
            path = %artifact.path.display(),
            duration = artifact.duration,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Composition complete"
        );

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{COMPOSED_AUDIO, MUSIC_TRACK};
    use crate::normalize::{MAIN_SCALED, MAIN_WITH_AUDIO};
    use crate::prescale::{BACKGROUND_SCALED, OUTRO_SCALED};
    use crate::probe::{StreamKind, StreamProbe};
    use crate::testing::RecordingExecutor;
    use crate::MediaError;
    use std::path::Path;
    use vcompose_models::{AssetKind, MediaAsset};

    fn assets(dir: &Path) -> AcquiredAssets {
        AcquiredAssets {
            main: MediaAsset::new(AssetKind::Main, dir.join("main.mp4")),
            background: MediaAsset::new(AssetKind::Background, dir.join("background.mp4")),
            outro: MediaAsset::new(AssetKind::Outro, dir.join("outro.mp4")),
            music: MediaAsset::new(AssetKind::Music, dir.join("music.mp3")),
        }
    }

    fn portrait_scenario() -> RecordingExecutor {
        RecordingExecutor::new()
            .with_probe("main.mp4", StreamProbe::video(500, 800).with_duration(60.0))
            .with_probe("background.mp4", StreamProbe::video(1920, 1080).with_duration(300.0))
            .with_probe("outro.mp4", StreamProbe::video(1920, 1080).with_audio().with_duration(10.0))
            .with_probe("music.mp3", StreamProbe::audio_only().with_duration(30.0))
    }

    #[tokio::test]
    async fn test_portrait_clip_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let exec = Arc::new(portrait_scenario());
        let compositor = Compositor::new(exec.clone(), dir.path());

        let artifact = compositor.compose(&assets(dir.path())).await.unwrap();

        let mut stages = exec.output_names();
        // Pre-scaling order is not fixed
        stages[2..4].sort();
        assert_eq!(
            stages,
            vec![
                MAIN_WITH_AUDIO,
                MAIN_SCALED,
                BACKGROUND_SCALED,
                OUTRO_SCALED,
                COMPOSED_VIDEO,
                MUSIC_TRACK,
                COMPOSED_AUDIO,
                FINAL_OUTPUT,
            ]
        );

        let probe = exec.probe(artifact.path()).await.unwrap();
        assert_eq!(probe.count(StreamKind::Video), 1);
        assert_eq!(probe.count(StreamKind::Audio), 1);
        assert_eq!(probe.resolution(artifact.path()).unwrap(), (1920, 1080));
        assert!((artifact.duration - 70.0).abs() <= 1.0);

        // 30s of music under 60s of main: looped and trimmed to 61s
        let music = exec.command_for(MUSIC_TRACK).unwrap();
        assert_eq!(music.output_value("-t"), Some("61.000"));

        let composed = exec.command_for(COMPOSED_VIDEO).unwrap();
        assert_eq!(composed.inputs()[0].source, dir.path().join(MAIN_SCALED));
        assert!(composed.report_dir().is_none());
    }

    #[tokio::test]
    async fn test_canonical_clip_skips_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let exec = Arc::new(
            portrait_scenario().with_probe(
                "main.mp4",
                StreamProbe::video(1920, 1080).with_audio().with_duration(45.0),
            ),
        );

        let artifact = Compositor::new(exec.clone(), dir.path())
            .with_recipe(AudioMixRecipe::Segmented)
            .with_debug_report(dir.path().join("reports"))
            .compose(&assets(dir.path()))
            .await
            .unwrap();

        let names = exec.output_names();
        assert!(!names.iter().any(|n| n == MAIN_WITH_AUDIO || n == MAIN_SCALED));
        assert!(!names.iter().any(|n| n == MUSIC_TRACK));

        let composed = exec.command_for(COMPOSED_VIDEO).unwrap();
        assert_eq!(composed.inputs()[0].source, dir.path().join("main.mp4"));
        assert!(composed.report_dir().is_some());
        // 45s main plus the 10s outro; the music tail stops with the outro
        assert!((artifact.duration - 55.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_segmented_artifact_matches_video_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let exec = Arc::new(
            portrait_scenario().with_probe(
                "main.mp4",
                StreamProbe::video(1920, 1080).with_audio().with_duration(60.0),
            ),
        );

        let artifact = Compositor::new(exec.clone(), dir.path())
            .with_recipe(AudioMixRecipe::Segmented)
            .compose(&assets(dir.path()))
            .await
            .unwrap();

        let video = exec.probe(&dir.path().join(COMPOSED_VIDEO)).await.unwrap();
        let audio = exec.probe(&dir.path().join(COMPOSED_AUDIO)).await.unwrap();
        assert_eq!(video.duration, Some(70.0));
        assert_eq!(audio.duration, Some(70.0));
        assert_eq!(artifact.duration, 70.0);
    }

    #[tokio::test]
    async fn test_stage_failure_aborts_before_mux() {
        let dir = tempfile::tempdir().unwrap();
        let exec = Arc::new(
            portrait_scenario().fail_output(COMPOSED_VIDEO, "Error initializing complex filters."),
        );

        let err = Compositor::new(exec.clone(), dir.path())
            .compose(&assets(dir.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::ExternalToolFailure { .. }));
        assert!(exec.command_for(FINAL_OUTPUT).is_none());
        assert!(exec.command_for(COMPOSED_AUDIO).is_none());
    }
}

//! Program audio: music bed preparation and mixing with the main clip.

use std::path::Path;
use tracing::{info, warn};

use vcompose_models::{AudioMixRecipe, EncodingProfile, MediaAsset};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::executor::MediaExecutor;
use crate::filters::{segmented_mix_graph, simple_mix_graph, FadeWindow, AUDIO_OUT};

pub const MUSIC_TRACK: &str = "music_track.m4a";
pub const COMPOSED_AUDIO: &str = "composed_audio.m4a";

/// Extra loop iterations beyond the minimum needed to cover the main clip.
pub const MUSIC_LOOP_SAFETY_MARGIN: u32 = 1;
/// Seconds of music kept past the end of the main clip when looping.
pub const MUSIC_TAIL_BUFFER_SECS: f64 = 1.0;

/// Whether the music bed is shorter than the main clip and must be looped.
///
/// An unknown main duration (0.0) never loops.
pub fn needs_music_loop(main_duration: f64, music_duration: f64) -> bool {
    main_duration > 0.0 && music_duration < main_duration
}

/// `-stream_loop` count for a bed of `music_duration` under `main_duration`.
///
/// Music shorter than a second is treated as one second long.
pub fn music_loop_count(main_duration: f64, music_duration: f64) -> u32 {
    let covering = (main_duration / music_duration.max(1.0)).ceil().max(0.0) as u32;
    covering + MUSIC_LOOP_SAFETY_MARGIN
}

/// Transcode the music bed to AAC, looping and trimming it to
/// `main_duration + 1s` when it is shorter than the main clip.
pub async fn prepare_music_track(
    exec: &dyn MediaExecutor,
    music: &MediaAsset,
    main_duration: f64,
    output: &Path,
) -> MediaResult<MediaAsset> {
    let music_duration = exec.probe(music.path()).await?.duration_secs();
    let profile = EncodingProfile::program();

    let cmd = if needs_music_loop(main_duration, music_duration) {
        let loops = music_loop_count(main_duration, music_duration);
        info!(
            main_duration,
            music_duration,
            loops,
            "Looping music bed to cover main clip"
        );
        FfmpegCommand::new(music.path(), output)
            .stream_loop(loops)
            .output_duration(main_duration + MUSIC_TAIL_BUFFER_SECS)
    } else {
        FfmpegCommand::new(music.path(), output)
    };

    exec.run(&cmd.no_video().audio_encoding(&profile)).await?;
    Ok(music.derived(output))
}

/// Build the final program audio from the normalized main clip and the
/// raw music bed.
///
/// The segmented recipe's music tail plays under the outro, so it never runs
/// longer than `outro_duration`.
pub async fn build_program_audio(
    exec: &dyn MediaExecutor,
    main: &MediaAsset,
    music: &MediaAsset,
    recipe: AudioMixRecipe,
    outro_duration: f64,
    work_dir: &Path,
) -> MediaResult<MediaAsset> {
    let probe = exec.probe(main.path()).await?;
    if !probe.has_audio() {
        return Err(MediaError::MissingMainAudio(main.path().to_path_buf()));
    }
    let main_duration = probe.duration_secs();
    if main_duration <= 0.0 {
        warn!(path = %main.path().display(), "Main clip duration unknown, music will not be looped");
    }

    let output = work_dir.join(COMPOSED_AUDIO);

    let cmd = match recipe {
        AudioMixRecipe::Simple => {
            let bed =
                prepare_music_track(exec, music, main_duration, &work_dir.join(MUSIC_TRACK)).await?;
            FfmpegCommand::new(main.path(), &output)
                .input(bed.path())
                .filter_complex(simple_mix_graph())
        }
        AudioMixRecipe::Segmented => FfmpegCommand::new(main.path(), &output)
            .input(music.path())
            .filter_complex(segmented_mix_graph(
                FadeWindow::LEAD_IN,
                FadeWindow::TAIL.within(outro_duration),
            )),
    };

    info!(recipe = %recipe, "Mixing program audio");
    let cmd = cmd
        .map(AUDIO_OUT)
        .no_video()
        .audio_encoding(&EncodingProfile::program());

    exec.run(&cmd).await?;
    Ok(music.derived(output))
}

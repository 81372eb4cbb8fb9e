//! Encoding profiles and audio mixing recipes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Pixel format every re-encoded video stream is converted to
pub const OUTPUT_PIXEL_FORMAT: &str = "yuv420p";

/// Audio bitrate for program audio (main clip, mix output)
pub const PROGRAM_AUDIO_BITRATE: &str = "192k";
/// Audio bitrate for the outro asset
pub const ASSET_AUDIO_BITRATE: &str = "128k";

/// Silent track synthesized for clips without audio
pub const SILENCE_CHANNEL_LAYOUT: &str = "stereo";
pub const SILENCE_SAMPLE_RATE: u32 = 44_100;

/// Width the main clip is scaled to before being overlaid on the background
pub const OVERLAY_WIDTH: u32 = 1400;

/// Video encoding profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingProfile {
    /// Video codec (e.g., "libx264")
    pub codec: String,
    /// Encoding preset (e.g., "superfast", "fast")
    pub preset: String,
    /// Constant Rate Factor (quality, 0-51, lower is better)
    pub crf: u8,
    /// Audio codec
    pub audio_codec: String,
    /// Audio bitrate
    pub audio_bitrate: String,
}

impl EncodingProfile {
    /// Profile for the main clip and the composed video: high quality, fast preset.
    pub fn program() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: "superfast".to_string(),
            crf: 18,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: PROGRAM_AUDIO_BITRATE.to_string(),
        }
    }

    /// Cheaper profile for background and outro pre-scaling.
    pub fn asset() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: "fast".to_string(),
            crf: 22,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: ASSET_AUDIO_BITRATE.to_string(),
        }
    }

    /// Video encoder arguments.
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-preset".to_string(),
            self.preset.clone(),
        ]
    }

    /// Audio encoder arguments.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Video followed by audio encoder arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args
    }
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self::program()
    }
}

/// How the final program audio is built from main audio and the music bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioMixRecipe {
    /// Loop the music to the main clip's length and average it with the main audio.
    #[default]
    Simple,
    /// Faded lead-in mixed under the main audio, then a faded music tail.
    Segmented,
}

impl AudioMixRecipe {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioMixRecipe::Simple => "simple",
            AudioMixRecipe::Segmented => "segmented",
        }
    }
}

impl fmt::Display for AudioMixRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AudioMixRecipe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "amix" => Ok(AudioMixRecipe::Simple),
            "segmented" | "fade" => Ok(AudioMixRecipe::Segmented),
            other => Err(format!("unknown audio mix recipe: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_profile() {
        let profile = EncodingProfile::program();
        assert_eq!(profile.codec, "libx264");
        assert_eq!(profile.crf, 18);
        assert_eq!(profile.preset, "superfast");
        assert_eq!(profile.audio_bitrate, "192k");
    }

    #[test]
    fn test_asset_profile_is_cheaper() {
        let asset = EncodingProfile::asset();
        assert!(asset.crf > EncodingProfile::program().crf);
        assert_eq!(asset.preset, "fast");
        assert_eq!(asset.audio_bitrate, "128k");
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = EncodingProfile::program().to_ffmpeg_args();
        assert_eq!(
            args,
            vec!["-c:v", "libx264", "-crf", "18", "-preset", "superfast", "-c:a", "aac", "-b:a", "192k"]
        );
    }

    #[test]
    fn test_audio_mix_recipe_parse() {
        assert_eq!("simple".parse::<AudioMixRecipe>().unwrap(), AudioMixRecipe::Simple);
        assert_eq!(" Segmented ".parse::<AudioMixRecipe>().unwrap(), AudioMixRecipe::Segmented);
        assert!("loud".parse::<AudioMixRecipe>().is_err());
        assert_eq!(AudioMixRecipe::default(), AudioMixRecipe::Simple);
    }
}

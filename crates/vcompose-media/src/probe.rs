//! FFprobe stream inspection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::{check_ffprobe, exit_status_error};
use crate::error::{MediaError, MediaResult};

/// Type of a container stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

impl StreamKind {
    fn from_codec_type(codec_type: &str) -> Self {
        match codec_type {
            "video" => StreamKind::Video,
            "audio" => StreamKind::Audio,
            _ => StreamKind::Other,
        }
    }
}

/// One stream of a probed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub kind: StreamKind,
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Everything the pipeline needs to know about a media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamProbe {
    pub streams: Vec<StreamDescriptor>,
    /// Container duration in seconds, when the container reports one
    pub duration: Option<f64>,
}

impl StreamProbe {
    /// Geometry of the first video stream.
    pub fn resolution(&self, path: &Path) -> MediaResult<(u32, u32)> {
        self.streams
            .iter()
            .find(|s| s.kind == StreamKind::Video)
            .and_then(|s| Some((s.width?, s.height?)))
            .ok_or_else(|| MediaError::NoVideoStream(path.to_path_buf()))
    }

    pub fn has_audio(&self) -> bool {
        self.count(StreamKind::Audio) > 0
    }

    pub fn count(&self, kind: StreamKind) -> usize {
        self.streams.iter().filter(|s| s.kind == kind).count()
    }

    /// Duration in seconds, `0.0` when unknown.
    pub fn duration_secs(&self) -> f64 {
        self.duration.filter(|d| d.is_finite() && *d > 0.0).unwrap_or(0.0)
    }

    /// Parse `ffprobe -of json -show_entries format:stream` output.
    pub fn from_ffprobe_json(bytes: &[u8]) -> MediaResult<Self> {
        let output: FfprobeOutput = serde_json::from_slice(bytes)?;

        let streams = output
            .streams
            .into_iter()
            .map(|s| StreamDescriptor {
                kind: StreamKind::from_codec_type(s.codec_type.as_deref().unwrap_or_default()),
                codec: s.codec_name,
                width: s.width,
                height: s.height,
            })
            .collect();

        // ffprobe reports "N/A" for containers without a duration
        let duration = output
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok());

        Ok(Self { streams, duration })
    }

    /// A single video stream of the given size.
    pub fn video(width: u32, height: u32) -> Self {
        Self {
            streams: vec![StreamDescriptor {
                kind: StreamKind::Video,
                codec: Some("h264".to_string()),
                width: Some(width),
                height: Some(height),
            }],
            duration: None,
        }
    }

    /// A single audio stream.
    pub fn audio_only() -> Self {
        Self::default().with_audio()
    }

    pub fn with_audio(mut self) -> Self {
        self.streams.push(StreamDescriptor {
            kind: StreamKind::Audio,
            codec: Some("aac".to_string()),
            width: None,
            height: None,
        });
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe a media file's streams and duration.
pub async fn probe_streams(path: impl AsRef<Path>) -> MediaResult<StreamProbe> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;
    debug!(path = %path.display(), "Probing media file");

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration:stream=codec_type,codec_name,width,height",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(exit_status_error(
            "ffprobe",
            output.status,
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    StreamProbe::from_ffprobe_json(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIP_JSON: &str = r#"{
        "streams": [
            {"codec_name": "h264", "codec_type": "video", "width": 500, "height": 800},
            {"codec_name": "aac", "codec_type": "audio"}
        ],
        "format": {"duration": "42.500000"}
    }"#;

    #[test]
    fn test_parse_ffprobe_json() {
        let probe = StreamProbe::from_ffprobe_json(CLIP_JSON.as_bytes()).unwrap();
        assert_eq!(probe.resolution(Path::new("clip.mp4")).unwrap(), (500, 800));
        assert!(probe.has_audio());
        assert_eq!(probe.count(StreamKind::Video), 1);
        assert!((probe.duration_secs() - 42.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_duration_is_zero() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"mp3"}],"format":{"duration":"N/A"}}"#;
        let probe = StreamProbe::from_ffprobe_json(json.as_bytes()).unwrap();
        assert_eq!(probe.duration, None);
        assert_eq!(probe.duration_secs(), 0.0);

        let probe = StreamProbe::from_ffprobe_json(b"{}").unwrap();
        assert_eq!(probe.duration_secs(), 0.0);
        assert!(probe.streams.is_empty());
    }

    #[test]
    fn test_no_video_stream() {
        let probe = StreamProbe::audio_only();
        let err = probe.resolution(Path::new("music.mp3")).unwrap_err();
        assert!(matches!(err, MediaError::NoVideoStream(p) if p == Path::new("music.mp3")));
    }

    #[test]
    fn test_subtitle_streams_are_other() {
        let json = r#"{"streams":[{"codec_type":"subtitle","codec_name":"mov_text"}]}"#;
        let probe = StreamProbe::from_ffprobe_json(json.as_bytes()).unwrap();
        assert_eq!(probe.count(StreamKind::Other), 1);
        assert!(!probe.has_audio());
    }

    #[test]
    fn test_builders() {
        let probe = StreamProbe::video(1920, 1080).with_audio().with_duration(10.0);
        assert_eq!(probe.resolution(Path::new("x")).unwrap(), (1920, 1080));
        assert!(probe.has_audio());
        assert_eq!(probe.duration_secs(), 10.0);
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_streams("/nonexistent/clip.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}

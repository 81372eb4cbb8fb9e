//! Media assets and frame geometry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The four inputs of a job. The topology is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// The primary clip fetched from Drive
    Main,
    /// Full-frame background the main clip is overlaid onto
    Background,
    /// Closing segment appended after the composed section
    Outro,
    /// Music bed mixed under the main audio
    Music,
}

impl AssetKind {
    /// Fixed assets, in acquisition order.
    pub const FIXED: [AssetKind; 3] = [AssetKind::Background, AssetKind::Outro, AssetKind::Music];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Main => "main",
            AssetKind::Background => "background",
            AssetKind::Outro => "outro",
            AssetKind::Music => "music",
        }
    }

    /// File name used both in the asset store and in the job directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            AssetKind::Main => "main.mp4",
            AssetKind::Background => "background.mp4",
            AssetKind::Outro => "outro.mp4",
            AssetKind::Music => "music.mp3",
        }
    }

    /// Whether the asset carries a video stream.
    pub fn is_video(&self) -> bool {
        !matches!(self, AssetKind::Music)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target geometry every composed video stream must share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFrame {
    pub width: u32,
    pub height: u32,
}

impl CanonicalFrame {
    /// 1920x1080, the frame all composition inputs are normalized to.
    pub const HD_1080: CanonicalFrame = CanonicalFrame {
        width: 1920,
        height: 1080,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when the given geometry is exactly this frame.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

impl Default for CanonicalFrame {
    fn default() -> Self {
        Self::HD_1080
    }
}

impl fmt::Display for CanonicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Metadata derived from probing a media file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Width in pixels of the first video stream (0 for audio-only files)
    pub width: u32,
    /// Height in pixels of the first video stream (0 for audio-only files)
    pub height: u32,
    /// Whether at least one audio stream is present
    pub has_audio: bool,
    /// Container duration in seconds, 0.0 when unknown
    pub duration: f64,
}

/// A local media file belonging to a job.
///
/// Assets are never modified in place: every stage writes a new file and
/// returns a new `MediaAsset` pointing at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub kind: AssetKind,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MediaInfo>,
}

impl MediaAsset {
    pub fn new(kind: AssetKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            info: None,
        }
    }

    /// Attach probed metadata.
    pub fn with_info(mut self, info: MediaInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// A new asset of the same kind stored at `path`, without metadata.
    pub fn derived(&self, path: impl Into<PathBuf>) -> Self {
        Self::new(self.kind, path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The four validated inputs of a job, all local to the job directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquiredAssets {
    pub main: MediaAsset,
    pub background: MediaAsset,
    pub outro: MediaAsset,
    pub music: MediaAsset,
}

impl AcquiredAssets {
    pub fn get(&self, kind: AssetKind) -> &MediaAsset {
        match kind {
            AssetKind::Main => &self.main,
            AssetKind::Background => &self.background,
            AssetKind::Outro => &self.outro,
            AssetKind::Music => &self.music,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaAsset> {
        [&self.main, &self.background, &self.outro, &self.music].into_iter()
    }
}

/// Final muxed output: one video stream, one audio stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedArtifact {
    pub path: PathBuf,
    /// Container duration in seconds
    pub duration: f64,
    pub frame: CanonicalFrame,
}

impl ComposedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without extension, used as a fallback object key.
    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }
}

//! FFmpeg `-progress` output parsing.

use serde::{Deserialize, Serialize};

/// Keys ffmpeg writes in each `-progress` block.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    pub fn out_time_secs(&self) -> f64 {
        self.out_time_ms as f64 / 1000.0
    }
}

/// Accumulates key/value lines into [`FfmpegProgress`] snapshots.
///
/// ffmpeg terminates each block with `progress=continue` or `progress=end`;
/// a snapshot is emitted only at that point.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    /// True for `key=value` lines emitted by `-progress`.
    pub fn is_progress_line(line: &str) -> bool {
        line.trim()
            .split_once('=')
            .map(|(key, _)| PROGRESS_KEYS.contains(&key) || key.starts_with("stream_"))
            .unwrap_or(false)
    }

    /// Feed one line; returns a snapshot when a block is complete.
    pub fn feed(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let current = &mut self.current;

        match key {
            "out_time_ms" | "out_time_us" => {
                // Both keys carry microseconds
                if let Ok(us) = value.parse::<i64>() {
                    current.out_time_ms = us / 1000;
                }
            }
            "out_time" => current.out_time = value.to_string(),
            "frame" => {
                if let Ok(frame) = value.parse() {
                    current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    current.fps = fps;
                }
            }
            "speed" => {
                // "1.5x" or "N/A"
                if let Some(speed) = value
                    .strip_suffix('x')
                    .and_then(|s| s.trim().parse().ok())
                {
                    current.speed = speed;
                }
            }
            "progress" => {
                current.is_complete = value == "end";
                return Some(current.clone());
            }
            _ => {}
        }

        None
    }
}

//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    /// An external tool exited non-zero or was killed by a signal.
    /// Output is kept verbatim so filter-graph and codec errors can be read directly.
    #[error("{tool} failed ({status}).\n\nSTDOUT:\n{stdout}\n\nSTDERR:\n{stderr}")]
    ExternalToolFailure {
        tool: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("Mux failed, stream copy was rejected: {source}")]
    Mux {
        #[source]
        source: Box<MediaError>,
    },

    #[error("No video stream found in {0}")]
    NoVideoStream(PathBuf),

    #[error("Main clip has no audio stream at mix time: {0}")]
    MissingMainAudio(PathBuf),

    #[error("Composed artifact is malformed: {0}")]
    InvalidArtifact(String),

    #[error("FFprobe output could not be parsed: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an external tool failure from a non-zero exit code.
    pub fn exit_failure(
        tool: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalToolFailure {
            tool: tool.into(),
            status: format!("returncode={}", exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Create an external tool failure for a process killed by a signal.
    pub fn signal_failure(
        tool: impl Into<String>,
        signal: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalToolFailure {
            tool: tool.into(),
            status: format!("terminated by signal {}", signal),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Wrap a failure of the final stream-copy mux.
    pub fn mux(source: MediaError) -> Self {
        Self::Mux {
            source: Box::new(source),
        }
    }

    /// Captured stderr of a failed external tool, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::ExternalToolFailure { stderr, .. } => Some(stderr),
            MediaError::Mux { source } => source.stderr(),
            _ => None,
        }
    }
}

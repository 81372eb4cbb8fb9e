//! FFmpeg CLI wrapper and composition stages.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs and filter graphs
//! - Progress parsing from `-progress pipe:2`
//! - Stream probing via ffprobe
//! - Normalization, pre-scaling, video composition, audio mixing and mux stages
//! - The `MediaExecutor` seam, with a recording implementation behind `test-util`

pub mod audio;
pub mod command;
pub mod compose;
pub mod error;
pub mod executor;
pub mod filters;
pub mod inspect;
pub mod normalize;
pub mod pipeline;
pub mod prescale;
pub mod probe;
pub mod progress;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, FilterGraph, MediaInput};
pub use error::{MediaError, MediaResult};
pub use executor::MediaExecutor;
pub use inspect::{get_duration, get_resolution, has_audio_stream, inspect, probe_info};
pub use pipeline::Compositor;
pub use probe::{probe_streams, StreamDescriptor, StreamKind, StreamProbe};
pub use progress::{FfmpegProgress, ProgressParser};

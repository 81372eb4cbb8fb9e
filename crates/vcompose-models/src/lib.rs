//! Shared data models for the vcompose video assembly job.
//!
//! This crate provides Serde-serializable types for:
//! - Job identifiers and requests
//! - Media assets and the canonical frame geometry
//! - Encoding profiles and audio mixing recipes
//! - Drive identifier extraction
//! - Publication results

pub mod asset;
pub mod drive_id;
pub mod encoding;
pub mod job;
pub mod publication;

// Re-export common types
pub use asset::{AcquiredAssets, AssetKind, CanonicalFrame, ComposedArtifact, MediaAsset, MediaInfo};
pub use drive_id::{extract_drive_id, DriveIdError, DriveIdResult};
pub use encoding::{
    AudioMixRecipe, EncodingProfile, ASSET_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC, DEFAULT_VIDEO_CODEC,
    OUTPUT_PIXEL_FORMAT, OVERLAY_WIDTH, PROGRAM_AUDIO_BITRATE, SILENCE_CHANNEL_LAYOUT,
    SILENCE_SAMPLE_RATE,
};
pub use job::{JobId, JobRequest, PublishRequest};
pub use publication::{DriveFile, HostedVideo, PublicationResult};

//! One-shot video assembly job.
//!
//! This crate provides:
//! - Environment configuration with fail-fast validation
//! - Acquisition of the Drive clip and the fixed assets
//! - Composition through the media stages
//! - Publication to Drive, the object store and YouTube

pub mod acquisition;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod publish;

pub use acquisition::{acquire_all, AssetSource, MainClipSource, MountedAssets, ObjectStoreAssets, SizeFloor};
pub use config::{AssetSourceKind, JobConfig};
pub use error::{JobError, JobResult};
pub use logging::JobLogger;
pub use pipeline::JobRunner;
pub use publish::{publish, DrivePublisher, ObjectPublisher, PublicationReport, Sinks, VideoPublisher};

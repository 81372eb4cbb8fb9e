//! S3-compatible object storage client.
//!
//! Used for both the fixed-asset bucket (background, outro, music) and the
//! output bucket. The default endpoint is Google Cloud Storage's S3
//! interoperability API.

pub mod client;
pub mod error;

pub use client::{object_key, ObjectStoreClient, ObjectStoreConfig, GCS_ENDPOINT};
pub use error::{StorageError, StorageResult};

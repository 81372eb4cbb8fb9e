//! Job identity and request definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a job run, used to correlate log lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hosting-platform metadata. Present only when the platform sink is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
}

/// One invocation of the assembly job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: JobId,
    /// Drive share URL or bare file id of the main clip
    pub source: String,
    /// Name of the uploaded artifact in the Drive output folder
    pub output_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishRequest>,
}

impl JobRequest {
    pub fn new(source: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            job_id: JobId::new(),
            source: source.into(),
            output_name: output_name.into(),
            publish: None,
        }
    }

    /// Request a hosting-platform upload with the given title.
    pub fn with_publish(
        mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        thumbnail: Option<PathBuf>,
    ) -> Self {
        self.publish = Some(PublishRequest {
            title: title.into(),
            description: description.into(),
            thumbnail,
        });
        self
    }
}

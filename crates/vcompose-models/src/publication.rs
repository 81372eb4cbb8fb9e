//! Publication results.
//!
//! Serialized as the job's final machine-readable output. Field names match
//! the sinks: `drive`, `gcs`, `youtube`.

use serde::{Deserialize, Serialize};

/// A file created in the Drive output folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

/// A video uploaded to the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedVideo {
    pub id: String,
    pub url: String,
}

impl HostedVideo {
    /// Short share URL for a YouTube video id.
    pub fn from_youtube_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let url = format!("https://youtu.be/{}", id);
        Self { id, url }
    }
}

/// Per-sink outcome of publication. A `None` field means the sink was not
/// configured or not attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationResult {
    pub drive: Option<DriveFile>,
    /// Object-store locator (e.g. `gs://bucket/key`)
    pub gcs: Option<String>,
    pub youtube: Option<HostedVideo>,
}

impl PublicationResult {
    /// Number of sinks that produced a result.
    pub fn published_count(&self) -> usize {
        [
            self.drive.is_some(),
            self.gcs.is_some(),
            self.youtube.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_serializes_nulls() {
        let result = PublicationResult::default();
        let json: serde_json::Value = serde_json::from_str(&result.to_json_pretty().unwrap()).unwrap();
        assert!(json["drive"].is_null());
        assert!(json["gcs"].is_null());
        assert!(json["youtube"].is_null());
        assert_eq!(result.published_count(), 0);
    }

    #[test]
    fn test_drive_file_camel_case() {
        let file: DriveFile = serde_json::from_str(
            r#"{"id":"abc","name":"out.mp4","webViewLink":"https://drive.google.com/file/d/abc/view"}"#,
        )
        .unwrap();
        assert_eq!(file.web_view_link.as_deref(), Some("https://drive.google.com/file/d/abc/view"));
    }

    #[test]
    fn test_hosted_video_url() {
        let video = HostedVideo::from_youtube_id("dQw4w9WgXcQ");
        assert_eq!(video.url, "https://youtu.be/dQw4w9WgXcQ");
    }

    #[test]
    fn test_published_count() {
        let result = PublicationResult {
            gcs: Some("gs://out/final/abc.mp4".to_string()),
            ..Default::default()
        };
        assert_eq!(result.published_count(), 1);
    }
}

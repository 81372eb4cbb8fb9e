//! Drive file identifier extraction.
//!
//! Accepts either a bare file id or a share URL. URLs are treated as
//! untrusted input; only the id characters Drive actually issues
//! (alphanumeric, `-`, `_`) are ever returned.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Minimum length of a bare Drive file id.
pub const MIN_BARE_ID_LEN: usize = 20;

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{20,}$").expect("valid bare id regex"));

static FILE_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)").expect("valid path id regex"));

static QUERY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=([A-Za-z0-9_-]+)").expect("valid query id regex"));

/// Errors that can occur during Drive id extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriveIdError {
    #[error("Could not parse a Drive file id from {0:?}")]
    InvalidIdentifier(String),
}

/// Result type for Drive id extraction.
pub type DriveIdResult<T> = Result<T, DriveIdError>;

/// Extract a Drive file id from a bare id or a share URL.
///
/// Supported forms:
/// - `1AbCdEfGhIjKlMnOpQrStUv` (bare id, at least 20 chars)
/// - `https://drive.google.com/file/d/FILE_ID/view?usp=sharing`
/// - `https://drive.google.com/open?id=FILE_ID`
/// - `https://drive.google.com/uc?export=download&id=FILE_ID`
pub fn extract_drive_id(url_or_id: &str) -> DriveIdResult<String> {
    let input = url_or_id.trim();

    if BARE_ID.is_match(input) {
        return Ok(input.to_string());
    }

    FILE_PATH_ID
        .captures(input)
        .or_else(|| QUERY_ID.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| DriveIdError::InvalidIdentifier(url_or_id.to_string()))
}

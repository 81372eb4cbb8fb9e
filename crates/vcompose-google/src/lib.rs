//! Google REST clients.
//!
//! This crate provides:
//! - Access tokens from application default credentials or an OAuth2 refresh token
//! - Drive download by file id and resumable upload into a folder
//! - YouTube resumable upload with optional thumbnail

pub mod auth;
pub mod drive;
pub mod error;
pub mod http;
pub mod token_cache;
pub mod youtube;

pub use auth::{
    AccessTokenSource, RefreshCredentials, RefreshTokenSource, StaticToken, DRIVE_SCOPES,
    YOUTUBE_SCOPES,
};
pub use drive::DriveClient;
pub use error::{GoogleError, GoogleResult};
pub use http::build_http_client;
pub use token_cache::TokenCache;
pub use youtube::YouTubeClient;

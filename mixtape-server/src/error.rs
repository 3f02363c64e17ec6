//! Error types for mixtape-server
//!
//! Defines the admission/moderation taxonomy using thiserror. The policy
//! variants carry the wire codes the metadata endpoint reports.

use thiserror::Error;

/// Main error type for the queue service
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors bubbled up from mixtape-common
    #[error(transparent)]
    Common(#[from] mixtape_common::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Submitted URL is not a YouTube or SoundCloud link
    #[error("Unsupported URL format")]
    UnsupportedFormat,

    /// Scraped duration exceeds the admission limit
    #[error("TOO_LONG_BLOCKED")]
    TooLong,

    /// Resolved title contains "nonstop"
    #[error("NONSTOP_BLOCKED")]
    NonstopBlocked,

    /// Resolved title matches the artist denylist
    #[error("J97_BLOCKED")]
    ArtistBlocked,

    /// Submitter already has the maximum number of pending songs
    #[error("Quota exceeded: {0} pending songs")]
    QuotaExceeded(i64),

    /// Display name missing while the name policy requires one
    #[error("Display name is required")]
    NameRequired,

    /// Display name is reserved for admins
    #[error("Name '{0}' is reserved")]
    NameReserved(String),

    /// Privileged operation without a valid session token
    #[error("Admin session required")]
    Unauthorized,

    /// Voter already cast this vote on this song
    #[error("Duplicate vote")]
    DuplicateVote,

    /// Upstream metadata/speech provider failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wire code for the metadata endpoint error body, where one exists
    pub fn wire_code(&self) -> Option<&'static str> {
        match self {
            Error::TooLong => Some("TOO_LONG_BLOCKED"),
            Error::NonstopBlocked => Some("NONSTOP_BLOCKED"),
            Error::ArtistBlocked => Some("J97_BLOCKED"),
            Error::UnsupportedFormat => Some("Unsupported URL format"),
            _ => None,
        }
    }
}

/// Convenience Result type using the service Error
pub type Result<T> = std::result::Result<T, Error>;

//! Metadata resolver
//!
//! Given a submitted URL, determines the canonical URL, title and thumbnail,
//! enforces the duration limit (YouTube only) and applies the content-policy
//! blocks before a submission is admitted.
//!
//! Upstream failures degrade to default values; only the explicit policy
//! blocks and unsupported-format errors propagate to the caller.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const YOUTUBE_OEMBED_URL: &str = "https://www.youtube.com/oembed";
const SOUNDCLOUD_OEMBED_URL: &str = "https://soundcloud.com/oembed";
const USER_AGENT: &str = "mixtape/0.1.0";
const FETCH_TIMEOUT_SECS: u64 = 10;

/// Titles containing any of these (case-insensitive substring) are rejected
/// with `ArtistBlocked`. Stage names and song titles of one artist, with
/// ascii-folded variants since uploaders spell them both ways.
const ARTIST_DENYLIST: &[&str] = &[
    "jack",
    "j97",
    "phương tuấn",
    "phuong tuan",
    "sóng gió",
    "song gio",
    "hoa hải đường",
    "hoa hai duong",
    "bạc phận",
    "bac phan",
    "đom đóm",
    "dom dom",
    "thiên lý ơi",
    "thien ly oi",
    "em gì ơi",
    "em gi oi",
    "ngôi sao cô đơn",
    "ngoi sao co don",
];

/// Characters allowed in a YouTube video id
fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Supported media providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    YouTube,
    SoundCloud,
}

/// Classify a URL by provider host patterns
pub fn classify(url: &str) -> Result<Provider> {
    if url.contains("youtube.com") || url.contains("youtu.be") {
        Ok(Provider::YouTube)
    } else if url.contains("soundcloud.com") {
        Ok(Provider::SoundCloud)
    } else {
        Err(Error::UnsupportedFormat)
    }
}

/// Extract the 11-character video id from the known YouTube URL shapes
/// (`watch?v=`, `youtu.be/`, `/embed/`, `/v/`, `/u/<char>/`).
pub fn extract_youtube_id(url: &str) -> Option<String> {
    let after_marker = |marker: &str| -> Option<&str> {
        url.find(marker).map(|pos| &url[pos + marker.len()..])
    };

    let tail = after_marker("watch?v=")
        .or_else(|| after_marker("youtu.be/"))
        .or_else(|| after_marker("/embed/"))
        .or_else(|| after_marker("/v/"))
        .or_else(|| {
            // /u/<char>/<id> shape: skip the single user segment
            let rest = after_marker("/u/")?;
            let mut chars = rest.chars();
            let first = chars.next()?;
            if first.is_ascii_alphanumeric() && chars.next() == Some('/') {
                Some(&rest[first.len_utf8() + 1..])
            } else {
                None
            }
        })?;

    let id: String = tail.chars().take_while(|c| is_id_char(*c)).collect();
    if id.len() == 11 {
        Some(id)
    } else {
        None
    }
}

/// Rebuild the canonical watch URL; falls back to the trimmed original when
/// id extraction fails.
pub fn canonicalize(url: &str) -> String {
    match extract_youtube_id(url) {
        Some(id) => format!("https://www.youtube.com/watch?v={}", id),
        None => url.trim().to_string(),
    }
}

/// Scan raw page markup for the `lengthSeconds` field
pub fn parse_length_seconds(page: &str) -> Option<u64> {
    let marker = "\"lengthSeconds\":\"";
    let pos = page.find(marker)?;
    let digits: String = page[pos + marker.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Duration guard: strictly longer than the limit blocks, unknown admits
pub fn check_duration(length_secs: Option<u64>, max_secs: u64) -> Result<()> {
    match length_secs {
        Some(length) if length > max_secs => Err(Error::TooLong),
        _ => Ok(()),
    }
}

/// Content policy gate, applied once the title is known.
///
/// Case-insensitive substring match; both blocks are terminal.
pub fn check_policy(title: &str) -> Result<()> {
    let lowered = title.to_lowercase();

    if lowered.contains("nonstop") {
        return Err(Error::NonstopBlocked);
    }

    if ARTIST_DENYLIST.iter().any(|token| lowered.contains(token)) {
        return Err(Error::ArtistBlocked);
    }

    Ok(())
}

/// Successful resolution result
#[derive(Debug, Clone)]
pub struct Resolved {
    pub canonical_url: String,
    pub title: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Deserialize)]
struct OembedResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnail_url: String,
}

/// Metadata resolver with a shared HTTP client
pub struct MetadataResolver {
    http_client: reqwest::Client,
}

impl MetadataResolver {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Upstream(e.to_string()))?;

        Ok(Self { http_client })
    }

    /// Resolve a URL into canonical URL + metadata, or a policy error.
    ///
    /// `max_duration_secs` is the admission limit; strictly longer videos
    /// are rejected with `TooLong`.
    pub async fn resolve(&self, url: &str, max_duration_secs: u64) -> Result<Resolved> {
        let provider = classify(url)?;

        let (canonical_url, oembed_endpoint) = match provider {
            Provider::YouTube => (canonicalize(url), YOUTUBE_OEMBED_URL),
            Provider::SoundCloud => (url.trim().to_string(), SOUNDCLOUD_OEMBED_URL),
        };

        // oembed failure never fails the resolution, only the policy checks do
        let (title, thumbnail_url) = self
            .fetch_oembed(oembed_endpoint, &canonical_url)
            .await
            .unwrap_or_default();

        // Duration guard runs even when oembed succeeded; a failed scrape
        // counts as unknown duration and admits.
        if provider == Provider::YouTube {
            let length = self.fetch_length_seconds(&canonical_url).await;
            if let Some(secs) = length {
                debug!("Scraped length {}s for {}", secs, canonical_url);
            }
            check_duration(length, max_duration_secs)?;
        }

        check_policy(&title)?;

        Ok(Resolved {
            canonical_url,
            title,
            thumbnail_url,
        })
    }

    /// Fetch oembed title/thumbnail; None on any failure
    async fn fetch_oembed(&self, endpoint: &str, target_url: &str) -> Option<(String, String)> {
        let response = self
            .http_client
            .get(endpoint)
            .query(&[("url", target_url), ("format", "json")])
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            warn!("oembed fetch for {} returned {}", target_url, response.status());
            return None;
        }

        let body: OembedResponse = response.json().await.ok()?;
        Some((body.title, body.thumbnail_url))
    }

    /// Fetch the watch page and scrape the length; None on any failure
    async fn fetch_length_seconds(&self, url: &str) -> Option<u64> {
        let response = self.http_client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let page = response.text().await.ok()?;
        parse_length_seconds(&page)
    }
}

//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).
//! All settings are global (not per-user).

use crate::error::{Error, Result};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Maximum pending songs per contributor before `QuotaExceeded`
pub async fn pending_song_quota(db: &SqlitePool) -> Result<i64> {
    Ok(get_setting::<i64>(db, "pending_song_quota").await?.unwrap_or(2))
}

/// Whether submissions must carry a non-empty display name
pub async fn require_display_name(db: &SqlitePool) -> Result<bool> {
    Ok(get_setting::<bool>(db, "require_display_name")
        .await?
        .unwrap_or(true))
}

/// Maximum admitted YouTube duration in seconds (strictly-greater-than blocks)
pub async fn max_song_duration_secs(db: &SqlitePool) -> Result<u64> {
    Ok(get_setting::<u64>(db, "max_song_duration_secs")
        .await?
        .unwrap_or(300))
}

/// Downvote count at which the current song is retired automatically
pub async fn downvote_retire_threshold(db: &SqlitePool) -> Result<i64> {
    Ok(get_setting::<i64>(db, "downvote_retire_threshold")
        .await?
        .unwrap_or(3))
}

/// Delay before a song the host failed to play is skipped
pub async fn error_skip_delay_ms(db: &SqlitePool) -> Result<u64> {
    match get_setting::<u64>(db, "error_skip_delay_ms").await? {
        Some(delay) => Ok(delay.clamp(0, 30_000)),
        None => Ok(3000),
    }
}

/// Number of chat messages served to a newly-connected client
pub async fn chat_history_limit(db: &SqlitePool) -> Result<i64> {
    match get_setting::<i64>(db, "chat_history_limit").await? {
        Some(limit) => Ok(limit.clamp(1, 1000)),
        None => Ok(100),
    }
}

/// Stored sha256 digest of the admin password (empty = login disabled)
pub async fn admin_password_hash(db: &SqlitePool) -> Result<String> {
    Ok(get_setting::<String>(db, "admin_password_hash")
        .await?
        .unwrap_or_default())
}

pub async fn set_admin_password_hash(db: &SqlitePool, hash: &str) -> Result<()> {
    set_setting(db, "admin_password_hash", hash.to_string()).await
}

/// Generic setting getter
///
/// Returns None if key doesn't exist in database.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &SqlitePool, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &SqlitePool, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

//! Admin sessions
//!
//! The admin gate is a shared password whose sha256 digest lives in the
//! settings table. A successful login mints an opaque session token stored
//! server-side; every privileged mutation revalidates the token. An empty
//! stored digest disables admin login entirely.

use crate::error::{Error, Result};
use chrono::Utc;
use mixtape_common::db::settings;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

/// Hex sha256 digest of a password
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    format!("{:x}", digest)
}

/// Store the admin password (hashed)
pub async fn set_admin_password(db: &SqlitePool, password: &str) -> Result<()> {
    settings::set_admin_password_hash(db, &hash_password(password)).await?;
    Ok(())
}

/// Exchange the shared password for a session token
pub async fn login(db: &SqlitePool, password: &str) -> Result<String> {
    let stored = settings::admin_password_hash(db).await?;
    if stored.is_empty() {
        warn!("Admin login attempted but no password is configured");
        return Err(Error::Unauthorized);
    }

    if hash_password(password) != stored {
        return Err(Error::Unauthorized);
    }

    let token = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, created_at) VALUES (?, ?)")
        .bind(&token)
        .bind(Utc::now())
        .execute(db)
        .await?;

    info!("Admin session issued");
    Ok(token)
}

/// Check whether a bearer token names a live session
pub async fn verify_session(db: &SqlitePool, token: &str) -> Result<bool> {
    if token.is_empty() {
        return Ok(false);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_one(db)
        .await?;
    Ok(count > 0)
}

/// Drop a session token (logout)
pub async fn revoke_session(db: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(db)
        .await?;
    Ok(())
}

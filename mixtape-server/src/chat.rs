//! Chat message store

use crate::error::{Error, Result};
use chrono::Utc;
use mixtape_common::db::models::ChatMessage;
use sqlx::SqlitePool;
use uuid::Uuid;

const MAX_MESSAGE_LEN: usize = 500;
const MAX_USERNAME_LEN: usize = 50;

/// Store a chat message and return the persisted row
pub async fn post(db: &SqlitePool, username: &str, message: &str) -> Result<ChatMessage> {
    let username = username.trim();
    let message = message.trim();

    if username.is_empty() {
        return Err(Error::BadRequest("Username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(Error::BadRequest("Username too long".to_string()));
    }
    if message.is_empty() {
        return Err(Error::BadRequest("Message is empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(Error::BadRequest("Message too long".to_string()));
    }

    let id = Uuid::new_v4();
    let created_at = Utc::now();

    sqlx::query("INSERT INTO chat_messages (id, username, message, created_at) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(username)
        .bind(message)
        .bind(created_at)
        .execute(db)
        .await?;

    Ok(ChatMessage {
        id,
        username: username.to_string(),
        message: message.to_string(),
        created_at,
    })
}

/// Most recent messages in chronological order
pub async fn recent(db: &SqlitePool, limit: i64) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM (
            SELECT * FROM chat_messages ORDER BY created_at DESC LIMIT ?
        ) ORDER BY created_at
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|r| ChatMessage::from_row(r).map_err(Error::from))
        .collect()
}

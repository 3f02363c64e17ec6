//! Database row models
//!
//! Ids are stored as TEXT (hyphenated uuid) and timestamps as RFC3339 TEXT;
//! row extraction is done manually so the wire types stay strongly typed.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

/// Lifecycle state of a queue row.
///
/// `Pending` rows are eligible for playback; `Played` and `Removed` are
/// terminal (retired naturally/by skip/by downvote vs. deleted by an admin).
/// There is no transition out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongStatus {
    Pending,
    Played,
    Removed,
}

impl SongStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SongStatus::Pending => "pending",
            SongStatus::Played => "played",
            SongStatus::Removed => "removed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SongStatus::Pending),
            "played" => Ok(SongStatus::Played),
            "removed" => Ok(SongStatus::Removed),
            other => Err(Error::Internal(format!("Unknown song status: {}", other))),
        }
    }
}

/// A submitted song (row in the `queue` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Authoritative FIFO position, assigned at insert
    pub order_index: i64,
    pub url: String,
    pub title: String,
    pub thumbnail_url: String,
    pub added_by: String,
    pub status: SongStatus,
    pub upvotes: i64,
    pub downvotes: i64,
}

impl Song {
    pub fn is_pending(&self) -> bool {
        self.status == SongStatus::Pending
    }

    /// Extract a Song from a `SELECT * FROM queue` row
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let id: String = row.get("id");
        let status: String = row.get("status");
        Ok(Song {
            id: Uuid::parse_str(&id)
                .map_err(|e| Error::Internal(format!("Invalid uuid in queue.id: {}", e)))?,
            created_at: row.get("created_at"),
            order_index: row.get("order_index"),
            url: row.get("url"),
            title: row.get("title"),
            thumbnail_url: row.get("thumbnail_url"),
            added_by: row.get("added_by"),
            status: SongStatus::from_str(&status)?,
            upvotes: row.get("upvotes"),
            downvotes: row.get("downvotes"),
        })
    }
}

/// Vote direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(VoteDirection::Up),
            "down" => Ok(VoteDirection::Down),
            other => Err(Error::InvalidInput(format!("Unknown vote direction: {}", other))),
        }
    }
}

/// A chat message (row in the `chat_messages` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub username: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let id: String = row.get("id");
        Ok(ChatMessage {
            id: Uuid::parse_str(&id)
                .map_err(|e| Error::Internal(format!("Invalid uuid in chat_messages.id: {}", e)))?,
            username: row.get("username"),
            message: row.get("message"),
            created_at: row.get("created_at"),
        })
    }
}

/// One leaderboard entry: contributor name and number of submissions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub count: i64,
}

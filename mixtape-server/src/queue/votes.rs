//! Vote / moderation engine
//!
//! One vote row per (song, voter). The tallies on the queue row are
//! recomputed from vote rows inside the same transaction, so they cannot
//! drift and a voter cannot stack repeat votes. A flip (changing direction)
//! adjusts both tallies.
//!
//! Crossing the downvote threshold retires the song, but only while it is
//! the current one; queued songs keep their downvotes and play anyway.

use crate::error::{Error, Result};
use crate::queue::store;
use chrono::Utc;
use mixtape_common::db::models::{Song, SongStatus, VoteDirection};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Record a vote and return the song with updated tallies.
///
/// Rejects a repeat vote of the same direction from the same voter with
/// `DuplicateVote`; a vote in the other direction flips the existing row.
pub async fn cast_vote(
    db: &SqlitePool,
    song_id: Uuid,
    voter_name: &str,
    direction: VoteDirection,
) -> Result<Song> {
    if voter_name.trim().is_empty() {
        return Err(Error::BadRequest("Voter name is required".to_string()));
    }

    let song = store::get_song(db, song_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Song {}", song_id)))?;
    if song.status != SongStatus::Pending {
        return Err(Error::BadRequest("Song is no longer in the queue".to_string()));
    }

    let mut tx = db.begin().await?;

    let existing: Option<String> =
        sqlx::query_scalar("SELECT vote_type FROM votes WHERE song_id = ? AND voter_name = ?")
            .bind(song_id.to_string())
            .bind(voter_name)
            .fetch_optional(&mut *tx)
            .await?;

    match existing.as_deref().map(VoteDirection::from_str).transpose()? {
        None => {
            sqlx::query(
                "INSERT INTO votes (id, song_id, voter_name, vote_type, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(song_id.to_string())
            .bind(voter_name)
            .bind(direction.as_str())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }
        Some(previous) if previous == direction => {
            // Transaction rolls back on drop
            return Err(Error::DuplicateVote);
        }
        Some(_) => {
            // Flip: the recount below adjusts both tallies
            sqlx::query(
                "UPDATE votes SET vote_type = ?, created_at = ?
                 WHERE song_id = ? AND voter_name = ?",
            )
            .bind(direction.as_str())
            .bind(Utc::now())
            .bind(song_id.to_string())
            .bind(voter_name)
            .execute(&mut *tx)
            .await?;
        }
    }

    // Tallies are derived, never incremented independently
    sqlx::query(
        r#"
        UPDATE queue SET
            upvotes = (SELECT COUNT(*) FROM votes WHERE song_id = ? AND vote_type = 'up'),
            downvotes = (SELECT COUNT(*) FROM votes WHERE song_id = ? AND vote_type = 'down')
        WHERE id = ?
        "#,
    )
    .bind(song_id.to_string())
    .bind(song_id.to_string())
    .bind(song_id.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    store::get_song(db, song_id)
        .await?
        .ok_or_else(|| Error::Internal("Voted song disappeared".to_string()))
}

/// Names of voters who cast a given direction on a song (vote tooltips)
pub async fn voters_for(
    db: &SqlitePool,
    song_id: Uuid,
    direction: VoteDirection,
) -> Result<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT voter_name FROM votes WHERE song_id = ? AND vote_type = ? ORDER BY created_at",
    )
    .bind(song_id.to_string())
    .bind(direction.as_str())
    .fetch_all(db)
    .await?;
    Ok(names)
}

/// Retire the song if it is the current one and its downvotes have reached
/// the threshold. Returns true when this call performed the retirement.
///
/// The transition only touches pending rows, so a duplicate delivery of the
/// same downvote event retires at most once.
pub async fn maybe_retire_downvoted(
    db: &SqlitePool,
    song: &Song,
    threshold: i64,
) -> Result<bool> {
    if song.downvotes < threshold {
        return Ok(false);
    }

    let current = store::current_song(db).await?;
    if current.map(|c| c.id) != Some(song.id) {
        // Only the currently-playing song is moderated out
        return Ok(false);
    }

    let retired = store::transition(db, song.id, SongStatus::Played).await?;
    if retired {
        info!("Song {} retired by downvotes ({})", song.id, song.downvotes);
    }
    Ok(retired)
}

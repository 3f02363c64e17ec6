//! Playback selector
//!
//! Owns the "current song" derivation and every terminal transition. The
//! current song is always the lowest-order pending row; hosts report
//! playback outcomes here and never mutate rows themselves, so two browsers
//! both acting as host stay harmless (stale reports are no-ops).

use crate::error::Result;
use crate::queue::store;
use crate::state::SharedState;
use chrono::Utc;
use mixtape_common::db::models::{Song, SongStatus};
use mixtape_common::events::{QueueEvent, RetireReason};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct PlaybackSelector {
    db: SqlitePool,
    state: Arc<SharedState>,
}

impl PlaybackSelector {
    pub fn new(db: SqlitePool, state: Arc<SharedState>) -> Self {
        Self { db, state }
    }

    /// Re-derive the current song after any queue mutation.
    ///
    /// A changed id is a new track (`CurrentChanged`); the same id with
    /// changed tallies only refreshes the cache, so playback never restarts
    /// over a vote.
    pub async fn refresh(&self) -> Result<Option<Song>> {
        let next = store::current_song(&self.db).await?;
        let previous = self.state.get_current_song().await;

        let track_changed = match (&previous, &next) {
            (Some(prev), Some(new)) => prev.id != new.id,
            (None, None) => false,
            _ => true,
        };

        self.state.set_current_song(next.clone()).await;

        if track_changed {
            info!(
                "Current song changed: {:?}",
                next.as_ref().map(|s| s.title.as_str())
            );
            self.state.broadcast_event(QueueEvent::CurrentChanged {
                song: next.clone(),
                timestamp: Utc::now(),
            });
        }

        Ok(next)
    }

    /// Host-reported natural end of playback.
    ///
    /// Validated against the current id; a stale report (the queue already
    /// advanced) is a no-op.
    pub async fn report_completed(&self, song_id: Uuid) -> Result<bool> {
        let current = store::current_song(&self.db).await?;
        if current.map(|c| c.id) != Some(song_id) {
            warn!("Stale completion report for {}", song_id);
            return Ok(false);
        }

        self.retire(song_id, RetireReason::Completed).await
    }

    /// Admin skip of whatever is currently playing
    pub async fn skip_current(&self) -> Result<Option<Uuid>> {
        match store::current_song(&self.db).await? {
            Some(song) => {
                self.retire(song.id, RetireReason::Skipped).await?;
                Ok(Some(song.id))
            }
            None => Ok(None),
        }
    }

    /// Administrative removal; works on queued rows too
    pub async fn remove(&self, song_id: Uuid) -> Result<bool> {
        let removed = store::transition(&self.db, song_id, SongStatus::Removed).await?;
        if removed {
            self.state.broadcast_event(QueueEvent::SongRetired {
                song_id,
                reason: RetireReason::Removed,
                timestamp: Utc::now(),
            });
            self.refresh().await?;
        }
        Ok(removed)
    }

    /// Apply downvote moderation after a vote landed on `song`
    pub async fn handle_downvote(&self, song: &Song, threshold: i64) -> Result<bool> {
        let retired = crate::queue::votes::maybe_retire_downvoted(&self.db, song, threshold).await?;
        if retired {
            self.state.broadcast_event(QueueEvent::SongRetired {
                song_id: song.id,
                reason: RetireReason::DownvotedOut,
                timestamp: Utc::now(),
            });
            self.refresh().await?;
        }
        Ok(retired)
    }

    /// Host-reported playback failure (embed refused to play).
    ///
    /// Schedules an automatic skip after `delay_ms`; a dead current song
    /// would otherwise block the queue for everyone. The skip is dropped if
    /// the current song changed in the meantime.
    pub fn schedule_error_skip(&self, song_id: Uuid, delay_ms: u64) -> JoinHandle<()> {
        let selector = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;

            match store::current_song(&selector.db).await {
                Ok(Some(current)) if current.id == song_id => {
                    warn!("Skipping unplayable song {}", song_id);
                    if let Err(e) = selector.retire(song_id, RetireReason::PlaybackError).await {
                        warn!("Failed to skip unplayable song {}: {}", song_id, e);
                    }
                }
                Ok(_) => info!("Error skip for {} cancelled, queue moved on", song_id),
                Err(e) => warn!("Error skip check failed for {}: {}", song_id, e),
            }
        })
    }

    async fn retire(&self, song_id: Uuid, reason: RetireReason) -> Result<bool> {
        let retired = store::transition(&self.db, song_id, SongStatus::Played).await?;
        if retired {
            info!("Song {} retired ({:?})", song_id, reason);
            self.state.broadcast_event(QueueEvent::SongRetired {
                song_id,
                reason,
                timestamp: Utc::now(),
            });
            self.refresh().await?;
        }
        Ok(retired)
    }
}

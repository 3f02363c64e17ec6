//! Queue store
//!
//! The single source of truth for submitted songs. Ordering is strict
//! submission order (`order_index`); votes affect retirement, never
//! position. Terminal transitions only ever touch `pending` rows, so
//! marking an already-retired song again is a no-op.

use crate::error::{Error, Result};
use chrono::Utc;
use mixtape_common::db::models::{LeaderboardEntry, Song, SongStatus};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Contributor names longer than this are skipped by the leaderboard
/// (early revisions wrote song titles into added_by)
const LEADERBOARD_NAME_LIMIT: i64 = 50;

/// Insert a new pending song, guarded by the per-submitter quota.
///
/// The quota check and the insert are a single statement, so two racing
/// submissions from the same name cannot both slip under the cap.
pub async fn insert_admitted(
    db: &SqlitePool,
    url: &str,
    title: &str,
    thumbnail_url: &str,
    added_by: &str,
    quota: i64,
) -> Result<Song> {
    let id = Uuid::new_v4();

    let result = sqlx::query(
        r#"
        INSERT INTO queue (id, created_at, order_index, url, title, thumbnail_url, added_by, status)
        SELECT ?, ?, COALESCE((SELECT MAX(order_index) FROM queue), 0) + 1, ?, ?, ?, ?, 'pending'
        WHERE (SELECT COUNT(*) FROM queue WHERE added_by = ? AND status = 'pending') < ?
        "#,
    )
    .bind(id.to_string())
    .bind(Utc::now())
    .bind(url)
    .bind(title)
    .bind(thumbnail_url)
    .bind(added_by)
    .bind(added_by)
    .bind(quota)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::QuotaExceeded(quota));
    }

    get_song(db, id)
        .await?
        .ok_or_else(|| Error::Internal("Inserted song not found".to_string()))
}

/// Fetch a single song by id
pub async fn get_song(db: &SqlitePool, id: Uuid) -> Result<Option<Song>> {
    let row = sqlx::query("SELECT * FROM queue WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    row.map(|r| Song::from_row(&r).map_err(Error::from)).transpose()
}

/// All pending songs in playback order
pub async fn list_pending(db: &SqlitePool) -> Result<Vec<Song>> {
    let rows = sqlx::query("SELECT * FROM queue WHERE status = 'pending' ORDER BY order_index")
        .fetch_all(db)
        .await?;

    rows.iter()
        .map(|r| Song::from_row(r).map_err(Error::from))
        .collect()
}

/// The single lowest-order pending song (None when the queue is drained)
pub async fn current_song(db: &SqlitePool) -> Result<Option<Song>> {
    let row = sqlx::query(
        "SELECT * FROM queue WHERE status = 'pending' ORDER BY order_index LIMIT 1",
    )
    .fetch_optional(db)
    .await?;

    row.map(|r| Song::from_row(&r).map_err(Error::from)).transpose()
}

/// Number of pending songs submitted under a display name
pub async fn count_pending_by(db: &SqlitePool, added_by: &str) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM queue WHERE added_by = ? AND status = 'pending'")
            .bind(added_by)
            .fetch_one(db)
            .await?;
    Ok(count)
}

/// Transition a pending song to a terminal state.
///
/// Returns false when the row was already terminal (or missing), which makes
/// duplicate retirement deliveries harmless.
pub async fn transition(db: &SqlitePool, id: Uuid, to: SongStatus) -> Result<bool> {
    if to == SongStatus::Pending {
        return Err(Error::Internal("Cannot transition back to pending".to_string()));
    }

    let result = sqlx::query("UPDATE queue SET status = ? WHERE id = ? AND status = 'pending'")
        .bind(to.as_str())
        .bind(id.to_string())
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Played songs, newest first. Admin-removed rows never surface here.
pub async fn history(db: &SqlitePool, limit: i64) -> Result<Vec<Song>> {
    let rows = sqlx::query(
        "SELECT * FROM queue WHERE status = 'played' ORDER BY order_index DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|r| Song::from_row(r).map_err(Error::from))
        .collect()
}

/// Submission counts per contributor, top 20.
///
/// Removed rows don't count; retired (played) ones do.
pub async fn leaderboard(db: &SqlitePool) -> Result<Vec<LeaderboardEntry>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT added_by, COUNT(*) AS count
        FROM queue
        WHERE status != 'removed' AND LENGTH(added_by) <= ?
        GROUP BY added_by
        ORDER BY count DESC, added_by
        LIMIT 20
        "#,
    )
    .bind(LEADERBOARD_NAME_LIMIT)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, count)| LeaderboardEntry { name, count })
        .collect())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    pub async fn setup_test_db() -> SqlitePool {
        // Single connection: every new in-memory connection is a fresh database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        mixtape_common::db::init::create_tables(&pool).await.unwrap();
        mixtape_common::db::init::init_default_settings(&pool).await.unwrap();
        pool
    }

    /// Insert a song bypassing the quota (large cap)
    pub async fn seed_song(db: &SqlitePool, title: &str, added_by: &str) -> Song {
        insert_admitted(
            db,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            title,
            "",
            added_by,
            i64::MAX,
        )
        .await
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn submit_then_list_round_trip() {
        let db = setup_test_db().await;

        let song = insert_admitted(
            &db,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "Never Gonna Give You Up",
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
            "alice",
            2,
        )
        .await
        .unwrap();

        let pending = list_pending(&db).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, song.id);
        assert_eq!(pending[0].status, SongStatus::Pending);
        assert_eq!(pending[0].upvotes, 0);
        assert_eq!(pending[0].downvotes, 0);
    }

    #[tokio::test]
    async fn quota_guard_blocks_third_pending_submission() {
        let db = setup_test_db().await;

        insert_admitted(&db, "u1", "one", "", "alice", 2).await.unwrap();
        let second = insert_admitted(&db, "u2", "two", "", "alice", 2).await.unwrap();

        let third = insert_admitted(&db, "u3", "three", "", "alice", 2).await;
        assert!(matches!(third, Err(Error::QuotaExceeded(2))));

        // A different submitter is unaffected
        insert_admitted(&db, "u4", "four", "", "bob", 2).await.unwrap();

        // After one of alice's songs retires, the third goes through
        assert!(transition(&db, second.id, SongStatus::Played).await.unwrap());
        insert_admitted(&db, "u3", "three", "", "alice", 2).await.unwrap();
    }

    #[tokio::test]
    async fn current_follows_fifo_order() {
        let db = setup_test_db().await;

        let a = seed_song(&db, "A", "alice").await;
        let b = seed_song(&db, "B", "bob").await;
        let c = seed_song(&db, "C", "carol").await;
        assert!(a.order_index < b.order_index && b.order_index < c.order_index);

        assert_eq!(current_song(&db).await.unwrap().unwrap().id, a.id);

        assert!(transition(&db, a.id, SongStatus::Played).await.unwrap());
        assert_eq!(current_song(&db).await.unwrap().unwrap().id, b.id);

        assert!(transition(&db, b.id, SongStatus::Played).await.unwrap());
        assert!(transition(&db, c.id, SongStatus::Played).await.unwrap());
        assert!(current_song(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transition_is_idempotent() {
        let db = setup_test_db().await;
        let song = seed_song(&db, "A", "alice").await;

        assert!(transition(&db, song.id, SongStatus::Played).await.unwrap());
        // Second delivery is a no-op
        assert!(!transition(&db, song.id, SongStatus::Played).await.unwrap());
        // A terminal row cannot switch terminal states either
        assert!(!transition(&db, song.id, SongStatus::Removed).await.unwrap());

        let stored = get_song(&db, song.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SongStatus::Played);
    }

    #[tokio::test]
    async fn removal_is_distinct_from_retirement() {
        let db = setup_test_db().await;
        let played = seed_song(&db, "played", "alice").await;
        let removed = seed_song(&db, "removed", "bob").await;

        transition(&db, played.id, SongStatus::Played).await.unwrap();
        transition(&db, removed.id, SongStatus::Removed).await.unwrap();

        // Only the played row surfaces in history
        let terminal = history(&db, 10).await.unwrap();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].id, played.id);

        // Removed rows don't count toward the leaderboard either
        let leaders = leaderboard(&db).await.unwrap();
        assert_eq!(leaders.len(), 1);
        assert_eq!(leaders[0].name, "alice");
    }

    #[tokio::test]
    async fn leaderboard_counts_and_skips_long_names() {
        let db = setup_test_db().await;
        seed_song(&db, "one", "alice").await;
        seed_song(&db, "two", "alice").await;
        seed_song(&db, "three", "bob").await;
        let long_name = "x".repeat(60);
        seed_song(&db, "four", &long_name).await;

        let leaders = leaderboard(&db).await.unwrap();
        assert_eq!(leaders.len(), 2);
        assert_eq!(leaders[0].name, "alice");
        assert_eq!(leaders[0].count, 2);
        assert_eq!(leaders[1].name, "bob");
    }
}

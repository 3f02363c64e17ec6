//! Submission admission controller
//!
//! Every submission passes name policy, reserved-name and URL-shape checks
//! before any network call, then metadata resolution, then the quota-guarded
//! insert. Policy blocks from the resolver propagate verbatim.

use crate::error::{Error, Result};
use crate::metadata::{self, MetadataResolver, Resolved};
use crate::queue::store;
use mixtape_common::db::models::Song;
use mixtape_common::db::settings;
use sqlx::SqlitePool;
use tracing::info;

/// Display name reserved for holders of an admin session
pub const RESERVED_ADMIN_NAME: &str = "admin";

/// Name used when anonymous submissions are allowed
const ANONYMOUS_NAME: &str = "anonymous";

pub struct AdmissionController {
    db: SqlitePool,
    resolver: MetadataResolver,
}

impl AdmissionController {
    pub fn new(db: SqlitePool) -> Result<Self> {
        Ok(Self {
            db,
            resolver: MetadataResolver::new()?,
        })
    }

    /// Validate and admit a submission; returns the stored pending Song.
    pub async fn submit(&self, url: &str, display_name: &str, is_admin: bool) -> Result<Song> {
        let name = self.validate(url, display_name, is_admin).await?;

        // Advisory quota check before paying for metadata resolution; the
        // guarded insert below stays the authority under races
        let quota = settings::pending_song_quota(&self.db).await?;
        if store::count_pending_by(&self.db, &name).await? >= quota {
            return Err(Error::QuotaExceeded(quota));
        }

        let max_duration = settings::max_song_duration_secs(&self.db).await?;
        let resolved = self.resolver.resolve(url, max_duration).await?;

        let song = self.insert_resolved(&resolved, &name).await?;
        info!("Admitted '{}' for {}", song.title, song.added_by);
        Ok(song)
    }

    /// Fail-fast checks that run before any network call.
    ///
    /// Returns the effective display name.
    pub async fn validate(&self, url: &str, display_name: &str, is_admin: bool) -> Result<String> {
        let name = display_name.trim();

        let name = if name.is_empty() {
            if settings::require_display_name(&self.db).await? {
                return Err(Error::NameRequired);
            }
            ANONYMOUS_NAME.to_string()
        } else {
            name.to_string()
        };

        if name.eq_ignore_ascii_case(RESERVED_ADMIN_NAME) && !is_admin {
            return Err(Error::NameReserved(name));
        }

        // URL shape before incurring a metadata fetch
        if url.trim().is_empty() {
            return Err(Error::BadRequest("URL is required".to_string()));
        }
        metadata::classify(url)?;

        Ok(name)
    }

    /// Quota-guarded insert of a resolved submission
    pub async fn insert_resolved(&self, resolved: &Resolved, name: &str) -> Result<Song> {
        let quota = settings::pending_song_quota(&self.db).await?;
        store::insert_admitted(
            &self.db,
            &resolved.canonical_url,
            &resolved.title,
            &resolved.thumbnail_url,
            name,
            quota,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::store::test_support::setup_test_db;
    use mixtape_common::db::models::SongStatus;
    use mixtape_common::db::settings::set_setting;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    async fn controller() -> AdmissionController {
        AdmissionController::new(setup_test_db().await).unwrap()
    }

    fn resolved(title: &str) -> Resolved {
        Resolved {
            canonical_url: URL.to_string(),
            title: title.to_string(),
            thumbnail_url: String::new(),
        }
    }

    #[tokio::test]
    async fn empty_name_rejected_when_required() {
        let ctl = controller().await;
        let result = ctl.validate(URL, "   ", false).await;
        assert!(matches!(result, Err(Error::NameRequired)));
    }

    #[tokio::test]
    async fn empty_name_defaults_when_policy_relaxed() {
        let ctl = controller().await;
        set_setting(&ctl.db, "require_display_name", "false").await.unwrap();

        let name = ctl.validate(URL, "", false).await.unwrap();
        assert_eq!(name, "anonymous");
    }

    #[tokio::test]
    async fn reserved_name_needs_admin_session() {
        let ctl = controller().await;

        let result = ctl.validate(URL, "admin", false).await;
        assert!(matches!(result, Err(Error::NameReserved(_))));
        let result = ctl.validate(URL, "ADMIN", false).await;
        assert!(matches!(result, Err(Error::NameReserved(_))));

        // Verified admin may use it
        assert_eq!(ctl.validate(URL, "admin", true).await.unwrap(), "admin");
    }

    #[tokio::test]
    async fn url_shape_checked_before_resolution() {
        let ctl = controller().await;

        assert!(matches!(
            ctl.validate("https://vimeo.com/123", "alice", false).await,
            Err(Error::UnsupportedFormat)
        ));
        assert!(matches!(
            ctl.validate("", "alice", false).await,
            Err(Error::BadRequest(_))
        ));
        ctl.validate("https://soundcloud.com/a/b", "alice", false).await.unwrap();
    }

    #[tokio::test]
    async fn insert_uses_canonical_url_and_defaults() {
        let ctl = controller().await;

        let song = ctl.insert_resolved(&resolved("Test Song"), "alice").await.unwrap();
        assert_eq!(song.url, URL);
        assert_eq!(song.status, SongStatus::Pending);
        assert_eq!((song.upvotes, song.downvotes), (0, 0));
        assert_eq!(song.added_by, "alice");
    }

    #[tokio::test]
    async fn quota_applies_through_admission() {
        let ctl = controller().await;

        ctl.insert_resolved(&resolved("one"), "alice").await.unwrap();
        ctl.insert_resolved(&resolved("two"), "alice").await.unwrap();
        let third = ctl.insert_resolved(&resolved("three"), "alice").await;
        assert!(matches!(third, Err(Error::QuotaExceeded(2))));
    }

    #[tokio::test]
    async fn over_quota_submission_rejected_before_resolution() {
        let ctl = controller().await;

        ctl.insert_resolved(&resolved("one"), "alice").await.unwrap();
        ctl.insert_resolved(&resolved("two"), "alice").await.unwrap();

        // Full submit path bails on the quota without reaching the resolver
        let result = ctl.submit(URL, "alice", false).await;
        assert!(matches!(result, Err(Error::QuotaExceeded(2))));

        // Another submitter is unaffected by alice's quota
        assert!(ctl.validate(URL, "bob", false).await.is_ok());
    }
}

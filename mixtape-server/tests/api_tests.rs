//! Integration tests for the HTTP API
//!
//! Exercises routing, the error taxonomy and the admin gate against an
//! in-memory database. Metadata resolution is network-bound, so submission
//! tests stop at the checks that run before any fetch; the resolver's own
//! pipeline is unit-tested in the library.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mixtape_server::api::server::{router, AppContext};
use mixtape_server::queue::store;
use mixtape_server::state::SharedState;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

async fn setup() -> (Router, SqlitePool) {
    // Single connection: every new in-memory connection is a fresh database
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");
    mixtape_common::db::init::create_tables(&db).await.unwrap();
    mixtape_common::db::init::init_default_settings(&db).await.unwrap();

    let state = Arc::new(SharedState::new());
    let ctx = AppContext::new(db.clone(), state).expect("Should build context");
    (router(ctx), db)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json_as_admin(uri: &str, body: Value, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn seed_song(db: &SqlitePool, title: &str, added_by: &str) -> mixtape_common::db::models::Song {
    store::insert_admitted(
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

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_module_and_version() {
    let (app, _db) = setup().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "mixtape");
    assert!(body["version"].is_string());
}

// =============================================================================
// Submission pre-checks
// =============================================================================

#[tokio::test]
async fn submit_rejects_missing_display_name() {
    let (app, _db) = setup().await;

    let request = post_json(
        "/queue/submit",
        json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ" }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_rejects_reserved_name_without_session() {
    let (app, _db) = setup().await;

    let request = post_json(
        "/queue/submit",
        json!({
            "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "displayName": "Admin"
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn submit_rejects_unsupported_url() {
    let (app, _db) = setup().await;

    let request = post_json(
        "/queue/submit",
        json!({ "url": "https://vimeo.com/12345", "displayName": "alice" }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Unsupported URL format");
}

#[tokio::test]
async fn metadata_rejects_unsupported_url() {
    let (app, _db) = setup().await;

    let request = get("/metadata?url=https://vimeo.com/12345");
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Unsupported URL format");
}

// =============================================================================
// Queue reads
// =============================================================================

#[tokio::test]
async fn queue_lists_pending_in_order() {
    let (app, db) = setup().await;
    seed_song(&db, "First", "alice").await;
    seed_song(&db, "Second", "bob").await;

    let response = app.clone().oneshot(get("/queue")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["songs"][0]["title"], "First");
    assert_eq!(body["songs"][1]["title"], "Second");

    let response = app.oneshot(get("/queue/current")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["song"]["title"], "First");
}

#[tokio::test]
async fn current_is_null_on_empty_queue() {
    let (app, _db) = setup().await;

    let response = app.oneshot(get("/queue/current")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert!(body["song"].is_null());
}

// =============================================================================
// Votes
// =============================================================================

#[tokio::test]
async fn duplicate_vote_is_conflict() {
    let (app, db) = setup().await;
    let song = seed_song(&db, "First", "alice").await;

    let uri = format!("/queue/{}/vote", song.id);
    let body = json!({ "voterName": "bob", "direction": "up" });

    let response = app.clone().oneshot(post_json(&uri, body.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let voted = extract_json(response.into_body()).await;
    assert_eq!(voted["upvotes"], 1);

    let response = app.oneshot(post_json(&uri, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn vote_on_unknown_song_is_not_found() {
    let (app, _db) = setup().await;

    let uri = format!("/queue/{}/vote", uuid::Uuid::new_v4());
    let response = app
        .oneshot(post_json(&uri, json!({ "voterName": "bob", "direction": "down" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn downvotes_retire_the_current_song() {
    let (app, db) = setup().await;
    let first = seed_song(&db, "First", "alice").await;
    seed_song(&db, "Second", "bob").await;

    let uri = format!("/queue/{}/vote", first.id);
    for voter in ["v1", "v2", "v3"] {
        let response = app
            .clone()
            .oneshot(post_json(&uri, json!({ "voterName": voter, "direction": "down" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/queue/current")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["song"]["title"], "Second");
}

#[tokio::test]
async fn voters_listed_per_direction() {
    let (app, db) = setup().await;
    let song = seed_song(&db, "First", "alice").await;

    let uri = format!("/queue/{}/vote", song.id);
    app.clone()
        .oneshot(post_json(&uri, json!({ "voterName": "bob", "direction": "up" })))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json(&uri, json!({ "voterName": "carol", "direction": "down" })))
        .await
        .unwrap();

    let response = app
        .oneshot(get(&format!("/queue/{}/voters", song.id)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["upvoters"][0], "bob");
    assert_eq!(body["downvoters"][0], "carol");
}

// =============================================================================
// Playback reports
// =============================================================================

#[tokio::test]
async fn advance_moves_queue_and_stale_report_is_flagged() {
    let (app, db) = setup().await;
    let first = seed_song(&db, "First", "alice").await;
    seed_song(&db, "Second", "bob").await;

    let body = json!({ "songId": first.id });
    let response = app
        .clone()
        .oneshot(post_json("/playback/advance", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = extract_json(response.into_body()).await;
    assert_eq!(result["advanced"], true);

    // Second browser reports the same completion
    let response = app
        .clone()
        .oneshot(post_json("/playback/advance", body))
        .await
        .unwrap();
    let result = extract_json(response.into_body()).await;
    assert_eq!(result["advanced"], false);

    let response = app.oneshot(get("/queue/current")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["song"]["title"], "Second");
}

#[tokio::test]
async fn playback_error_is_accepted() {
    let (app, db) = setup().await;
    let first = seed_song(&db, "First", "alice").await;

    let response = app
        .oneshot(post_json("/playback/error", json!({ "songId": first.id })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

// =============================================================================
// Admin gate
// =============================================================================

async fn admin_token(db: &SqlitePool, app: &Router) -> String {
    mixtape_server::auth::set_admin_password(db, "hunter2")
        .await
        .unwrap();
    let response = app
        .clone()
        .oneshot(post_json("/auth/login", json!({ "password": "hunter2" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn login_rejected_when_no_password_configured() {
    let (app, _db) = setup().await;

    let response = app
        .oneshot(post_json("/auth/login", json!({ "password": "anything" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn skip_requires_admin_session() {
    let (app, db) = setup().await;
    seed_song(&db, "First", "alice").await;
    seed_song(&db, "Second", "bob").await;

    let response = app
        .clone()
        .oneshot(post_json("/playback/skip", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = admin_token(&db, &app).await;
    let response = app
        .clone()
        .oneshot(post_json_as_admin("/playback/skip", json!({}), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/queue/current")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["song"]["title"], "Second");
}

#[tokio::test]
async fn remove_requires_admin_and_hits_queued_songs() {
    let (app, db) = setup().await;
    seed_song(&db, "First", "alice").await;
    let second = seed_song(&db, "Second", "bob").await;

    let uri = format!("/queue/{}", second.id);
    let request = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = admin_token(&db, &app).await;
    let request = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Removal of a non-current song leaves the current song alone
    let response = app.clone().oneshot(get("/queue/current")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["song"]["title"], "First");

    // Second delete of the same row finds nothing pending
    let request = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Removed song never reaches history or the leaderboard
    let history = store::history(&db, 10).await.unwrap();
    assert!(history.iter().all(|s| s.id != second.id));
    assert!(store::leaderboard(&db)
        .await
        .unwrap()
        .iter()
        .all(|e| e.name != "bob"));
}

#[tokio::test]
async fn reload_broadcast_requires_admin() {
    let (app, db) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json("/broadcast/reload", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = admin_token(&db, &app).await;
    let response = app
        .oneshot(post_json_as_admin("/broadcast/reload", json!({}), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let (app, db) = setup().await;
    let token = admin_token(&db, &app).await;

    let response = app
        .clone()
        .oneshot(post_json_as_admin("/auth/logout", json!({}), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(post_json_as_admin("/playback/skip", json!({}), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Chat and reactions
// =============================================================================

#[tokio::test]
async fn chat_round_trip() {
    let (app, _db) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json("/chat", json!({ "username": "alice", "message": "hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/chat")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["messages"][0]["username"], "alice");
    assert_eq!(body["messages"][0]["message"], "hello");
}

#[tokio::test]
async fn reaction_validates_emoji() {
    let (app, _db) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json("/broadcast/reaction", json!({ "emoji": "🔥", "sender": "alice" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post_json("/broadcast/reaction", json!({ "emoji": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Leaderboard
// =============================================================================

#[tokio::test]
async fn leaderboard_counts_submissions() {
    let (app, db) = setup().await;
    seed_song(&db, "A", "alice").await;
    seed_song(&db, "B", "alice").await;
    seed_song(&db, "C", "bob").await;

    let response = app.oneshot(get("/leaderboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["entries"][0]["name"], "alice");
    assert_eq!(body["entries"][0]["count"], 2);
}

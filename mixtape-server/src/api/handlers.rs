//! HTTP request handlers
//!
//! Implements the REST endpoints for submissions, queue reads, votes,
//! playback reports, chat, admin sessions and the announcement proxy.

use crate::api::server::AppContext;
use crate::auth;
use crate::chat;
use crate::error::Error;
use crate::queue::{store, votes};
use crate::tts::SpeechResult;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use mixtape_common::db::models::{ChatMessage, LeaderboardEntry, Song, VoteDirection};
use mixtape_common::db::settings;
use mixtape_common::events::QueueEvent;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    title: String,
    thumbnail_url: String,
    clean_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    url: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    songs: Vec<Song>,
}

#[derive(Debug, Serialize)]
pub struct CurrentResponse {
    song: Option<Song>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    voter_name: String,
    direction: String,
}

#[derive(Debug, Serialize)]
pub struct VotersResponse {
    upvoters: Vec<String>,
    downvoters: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackReport {
    song_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    advanced: bool,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    skipped: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    username: String,
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    emoji: String,
    #[serde(default)]
    sender: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    text: String,
}

// ============================================================================
// Error mapping
// ============================================================================

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a service error onto the HTTP taxonomy
fn error_response(e: Error) -> ApiError {
    let status = match &e {
        Error::UnsupportedFormat
        | Error::TooLong
        | Error::NonstopBlocked
        | Error::ArtistBlocked
        | Error::NameRequired
        | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        Error::Unauthorized | Error::NameReserved(_) => StatusCode::FORBIDDEN,
        Error::DuplicateVote => StatusCode::CONFLICT,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Upstream(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", e);
    }

    let message = match e.wire_code() {
        Some(code) => code.to_string(),
        None => e.to_string(),
    };
    (status, Json(ErrorResponse { error: message }))
}

fn common_error(e: mixtape_common::Error) -> ApiError {
    error_response(Error::Common(e))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn is_admin(ctx: &AppContext, headers: &HeaderMap) -> Result<bool, ApiError> {
    match bearer_token(headers) {
        Some(token) => auth::verify_session(&ctx.db, token)
            .await
            .map_err(error_response),
        None => Ok(false),
    }
}

async fn require_admin(ctx: &AppContext, headers: &HeaderMap) -> Result<(), ApiError> {
    if is_admin(ctx, headers).await? {
        Ok(())
    } else {
        Err(error_response(Error::Unauthorized))
    }
}

// ============================================================================
// Health
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "mixtape".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Metadata
// ============================================================================

/// GET /metadata?url= - Resolve a URL without touching the queue
///
/// Runs the same resolution and policy pipeline as submission, so a client
/// can preview a link (and surface policy blocks) before submitting it.
pub async fn resolve_metadata(
    State(ctx): State<AppContext>,
    Query(query): Query<MetadataQuery>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let max_duration = settings::max_song_duration_secs(&ctx.db)
        .await
        .map_err(common_error)?;
    let resolved = ctx
        .resolver
        .resolve(&query.url, max_duration)
        .await
        .map_err(error_response)?;

    Ok(Json(MetadataResponse {
        title: resolved.title,
        thumbnail_url: resolved.thumbnail_url,
        clean_url: resolved.canonical_url,
    }))
}

// ============================================================================
// Queue
// ============================================================================

/// POST /queue/submit - Admit a song into the pending queue
pub async fn submit(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<Song>, ApiError> {
    let admin = is_admin(&ctx, &headers).await?;
    let song = ctx
        .admission
        .submit(&req.url, &req.display_name, admin)
        .await
        .map_err(error_response)?;

    ctx.state.broadcast_event(QueueEvent::QueueUpdated {
        song: song.clone(),
        timestamp: Utc::now(),
    });
    ctx.selector.refresh().await.map_err(error_response)?;

    Ok(Json(song))
}

/// GET /queue - Pending songs in playback order
pub async fn get_queue(State(ctx): State<AppContext>) -> Result<Json<QueueResponse>, ApiError> {
    let songs = store::list_pending(&ctx.db).await.map_err(error_response)?;
    Ok(Json(QueueResponse { songs }))
}

/// GET /queue/current - The song the host should be playing right now
pub async fn get_current(State(ctx): State<AppContext>) -> Result<Json<CurrentResponse>, ApiError> {
    let song = store::current_song(&ctx.db).await.map_err(error_response)?;
    Ok(Json(CurrentResponse { song }))
}

/// GET /queue/history - Recently retired songs, newest first
pub async fn get_history(
    State(ctx): State<AppContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<QueueResponse>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let songs = store::history(&ctx.db, limit).await.map_err(error_response)?;
    Ok(Json(QueueResponse { songs }))
}

/// GET /leaderboard - Top submitters
pub async fn get_leaderboard(
    State(ctx): State<AppContext>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let entries = store::leaderboard(&ctx.db).await.map_err(error_response)?;
    Ok(Json(LeaderboardResponse { entries }))
}

/// POST /queue/:song_id/vote - Cast or flip a vote
pub async fn vote(
    State(ctx): State<AppContext>,
    Path(song_id): Path<Uuid>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<Song>, ApiError> {
    let direction = VoteDirection::from_str(&req.direction).map_err(|_| {
        error_response(Error::BadRequest(
            "Vote direction must be 'up' or 'down'".to_string(),
        ))
    })?;

    let song = votes::cast_vote(&ctx.db, song_id, &req.voter_name, direction)
        .await
        .map_err(error_response)?;

    ctx.state.broadcast_event(QueueEvent::VoteCast {
        song_id,
        upvotes: song.upvotes,
        downvotes: song.downvotes,
        timestamp: Utc::now(),
    });

    if direction == VoteDirection::Down {
        let threshold = settings::downvote_retire_threshold(&ctx.db)
            .await
            .map_err(common_error)?;
        ctx.selector
            .handle_downvote(&song, threshold)
            .await
            .map_err(error_response)?;
    }
    // Pick up the new tallies in the cached current song
    ctx.selector.refresh().await.map_err(error_response)?;

    Ok(Json(song))
}

/// GET /queue/:song_id/voters - Who voted which way (vote tooltips)
pub async fn get_voters(
    State(ctx): State<AppContext>,
    Path(song_id): Path<Uuid>,
) -> Result<Json<VotersResponse>, ApiError> {
    let upvoters = votes::voters_for(&ctx.db, song_id, VoteDirection::Up)
        .await
        .map_err(error_response)?;
    let downvoters = votes::voters_for(&ctx.db, song_id, VoteDirection::Down)
        .await
        .map_err(error_response)?;
    Ok(Json(VotersResponse { upvoters, downvoters }))
}

/// DELETE /queue/:song_id - Administrative removal
pub async fn remove_song(
    State(ctx): State<AppContext>,
    Path(song_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    require_admin(&ctx, &headers).await?;

    let removed = ctx.selector.remove(song_id).await.map_err(error_response)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(error_response(Error::NotFound(format!(
            "No pending song {}",
            song_id
        ))))
    }
}

// ============================================================================
// Playback reports
// ============================================================================

/// POST /playback/advance - Host reports natural end of the current song
pub async fn playback_advance(
    State(ctx): State<AppContext>,
    Json(req): Json<PlaybackReport>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let advanced = ctx
        .selector
        .report_completed(req.song_id)
        .await
        .map_err(error_response)?;
    Ok(Json(AdvanceResponse { advanced }))
}

/// POST /playback/error - Host reports the embed refused to play
///
/// Schedules a delayed automatic skip; responds before the skip runs.
pub async fn playback_error(
    State(ctx): State<AppContext>,
    Json(req): Json<PlaybackReport>,
) -> Result<StatusCode, ApiError> {
    let delay_ms = settings::error_skip_delay_ms(&ctx.db)
        .await
        .map_err(common_error)?;
    let _ = ctx.selector.schedule_error_skip(req.song_id, delay_ms);
    Ok(StatusCode::ACCEPTED)
}

/// POST /playback/skip - Admin skips whatever is playing
pub async fn playback_skip(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<SkipResponse>, ApiError> {
    require_admin(&ctx, &headers).await?;
    let skipped = ctx.selector.skip_current().await.map_err(error_response)?;
    Ok(Json(SkipResponse { skipped }))
}

// ============================================================================
// Admin sessions
// ============================================================================

/// POST /auth/login - Exchange the shared password for a session token
pub async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = auth::login(&ctx.db, &req.password)
        .await
        .map_err(error_response)?;
    Ok(Json(LoginResponse { token }))
}

/// POST /auth/logout - Revoke the presented session token
pub async fn logout(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers).ok_or_else(|| {
        error_response(Error::BadRequest("Bearer token is required".to_string()))
    })?;
    auth::revoke_session(&ctx.db, token)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Chat and ephemeral broadcasts
// ============================================================================

/// GET /chat - Recent chat messages, oldest first
pub async fn get_chat(State(ctx): State<AppContext>) -> Result<Json<ChatResponse>, ApiError> {
    let limit = settings::chat_history_limit(&ctx.db)
        .await
        .map_err(common_error)?;
    let messages = chat::recent(&ctx.db, limit).await.map_err(error_response)?;
    Ok(Json(ChatResponse { messages }))
}

/// POST /chat - Post a chat message
pub async fn post_chat(
    State(ctx): State<AppContext>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatMessage>, ApiError> {
    let message = chat::post(&ctx.db, &req.username, &req.message)
        .await
        .map_err(error_response)?;

    ctx.state.broadcast_event(QueueEvent::ChatPosted {
        message: message.clone(),
        timestamp: Utc::now(),
    });

    Ok(Json(message))
}

/// POST /broadcast/reaction - Ephemeral emoji reaction, fan-out only
pub async fn send_reaction(
    State(ctx): State<AppContext>,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let emoji = req.emoji.trim();
    if emoji.is_empty() || emoji.chars().count() > 8 {
        return Err(error_response(Error::BadRequest(
            "Reaction emoji is required".to_string(),
        )));
    }

    let sender = req.sender.trim();
    let sender = if sender.is_empty() { "anonymous" } else { sender };

    ctx.state.broadcast_event(QueueEvent::Reaction {
        emoji: emoji.to_string(),
        sender: sender.to_string(),
        timestamp: Utc::now(),
    });

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// POST /broadcast/reload - Admin asks every connected client to reload
pub async fn send_reload(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    require_admin(&ctx, &headers).await?;

    ctx.state.broadcast_event(QueueEvent::Reload {
        timestamp: Utc::now(),
    });
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

// ============================================================================
// Announcement audio
// ============================================================================

/// POST /tts - Proxy announcement text to the speech provider
pub async fn synthesize_speech(
    State(ctx): State<AppContext>,
    Json(req): Json<SpeechRequest>,
) -> Response {
    match ctx.speech.synthesize(&req.text).await {
        Ok(SpeechResult::Audio(bytes)) => {
            ([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response()
        }
        Ok(SpeechResult::UpstreamError(status)) => {
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (
                status,
                Json(ErrorResponse {
                    error: "Speech provider error".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

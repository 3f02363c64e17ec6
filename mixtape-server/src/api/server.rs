//! HTTP server setup and routing
//!
//! Sets up the Axum server with all queue, playback, chat, auth and SSE
//! routes. CORS is permissive: the player page and viewer pages are served
//! from wherever the party host puts them.

use crate::admission::AdmissionController;
use crate::error::{Error, Result};
use crate::metadata::MetadataResolver;
use crate::queue::selector::PlaybackSelector;
use crate::state::SharedState;
use crate::tts::SpeechClient;
use axum::{
    routing::{delete, get, post},
    Router,
};
use sqlx::{Pool, Sqlite};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for free
/// via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub db: Pool<Sqlite>,
    pub state: Arc<SharedState>,
    pub selector: PlaybackSelector,
    pub admission: Arc<AdmissionController>,
    pub resolver: Arc<MetadataResolver>,
    pub speech: Arc<SpeechClient>,
}

impl AppContext {
    pub fn new(db: Pool<Sqlite>, state: Arc<SharedState>) -> Result<Self> {
        Ok(Self {
            selector: PlaybackSelector::new(db.clone(), state.clone()),
            admission: Arc::new(AdmissionController::new(db.clone())?),
            resolver: Arc::new(MetadataResolver::new()?),
            speech: Arc::new(SpeechClient::new()?),
            db,
            state,
        })
    }
}

/// Build the service router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Metadata preview (no queue mutation)
        .route("/metadata", get(super::handlers::resolve_metadata))
        // Queue
        .route("/queue/submit", post(super::handlers::submit))
        .route("/queue", get(super::handlers::get_queue))
        .route("/queue/current", get(super::handlers::get_current))
        .route("/queue/history", get(super::handlers::get_history))
        .route("/queue/:song_id/vote", post(super::handlers::vote))
        .route("/queue/:song_id/voters", get(super::handlers::get_voters))
        .route("/queue/:song_id", delete(super::handlers::remove_song))
        .route("/leaderboard", get(super::handlers::get_leaderboard))
        // Playback reports from the host page
        .route("/playback/advance", post(super::handlers::playback_advance))
        .route("/playback/error", post(super::handlers::playback_error))
        .route("/playback/skip", post(super::handlers::playback_skip))
        // Admin sessions
        .route("/auth/login", post(super::handlers::login))
        .route("/auth/logout", post(super::handlers::logout))
        // Chat and ephemeral broadcasts
        .route("/chat", get(super::handlers::get_chat).post(super::handlers::post_chat))
        .route("/broadcast/reaction", post(super::handlers::send_reaction))
        .route("/broadcast/reload", post(super::handlers::send_reload))
        // Announcement audio
        .route("/tts", post(super::handlers::synthesize_speech))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until the process is stopped
pub async fn run(port: u16, ctx: AppContext) -> Result<()> {
    let app = router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

//! Server-Sent Events (SSE) fan-out
//!
//! Streams typed queue events to every connected viewer. Each connection
//! also bumps the viewer count, announced to everyone as a ViewerCount
//! event on connect and disconnect.

use crate::api::server::AppContext;
use crate::state::SharedState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::Utc;
use futures::stream::{Stream, StreamExt};
use mixtape_common::events::QueueEvent;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// Announces the viewer count when a connection ends
struct ViewerGuard {
    state: Arc<SharedState>,
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        // The receiver for this connection is already gone at this point
        self.state.broadcast_event(QueueEvent::ViewerCount {
            count: self.state.viewer_count(),
            timestamp: Utc::now(),
        });
    }
}

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let rx = ctx.state.subscribe_events();
    ctx.state.broadcast_event(QueueEvent::ViewerCount {
        count: ctx.state.viewer_count(),
        timestamp: Utc::now(),
    });

    let guard = ViewerGuard {
        state: ctx.state.clone(),
    };

    // The guard rides along with the stream so its Drop fires on disconnect
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let _ = &guard;
        async move {
            match result {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => Some(Ok(Event::default()
                        .event(event.event_type())
                        .data(json))),
                    Err(e) => {
                        warn!("Failed to serialize event: {}", e);
                        None
                    }
                },
                Err(e) => {
                    // BroadcastStream error (lagged or closed)
                    warn!("SSE stream error: {:?}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

//! Event types for the mixtape fan-out
//!
//! Every mutation of the queue store is announced to all connected viewers
//! as a typed event carrying the mutated row, so subscribers can patch local
//! state instead of refetching everything.

use crate::db::models::{ChatMessage, Song};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a song left the pending queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireReason {
    /// Natural end of playback reported by the host
    Completed,
    /// Manual skip by an admin
    Skipped,
    /// Downvote threshold crossed while current
    DownvotedOut,
    /// Playback surface failed to play the embed
    PlaybackError,
    /// Administrative removal
    Removed,
}

/// Mixtape event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    /// A queue row was inserted or updated
    QueueUpdated {
        song: Song,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current song changed (None when the queue drained)
    CurrentChanged {
        song: Option<Song>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A song reached a terminal state
    SongRetired {
        song_id: Uuid,
        reason: RetireReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Vote tallies changed on a song
    VoteCast {
        song_id: Uuid,
        upvotes: i64,
        downvotes: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A chat message was posted
    ChatPosted {
        message: ChatMessage,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Ephemeral emoji reaction (not persisted)
    Reaction {
        emoji: String,
        sender: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Number of connected viewers changed
    ViewerCount {
        count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Ask all clients to reload (admin broadcast)
    Reload {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl QueueEvent {
    /// Event type string used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            QueueEvent::QueueUpdated { .. } => "QueueUpdated",
            QueueEvent::CurrentChanged { .. } => "CurrentChanged",
            QueueEvent::SongRetired { .. } => "SongRetired",
            QueueEvent::VoteCast { .. } => "VoteCast",
            QueueEvent::ChatPosted { .. } => "ChatPosted",
            QueueEvent::Reaction { .. } => "Reaction",
            QueueEvent::ViewerCount { .. } => "ViewerCount",
            QueueEvent::Reload { .. } => "Reload",
        }
    }
}

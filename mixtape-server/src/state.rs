//! Shared service state
//!
//! Thread-safe state shared between HTTP handlers, the playback selector
//! and the SSE fan-out.

use mixtape_common::db::models::Song;
use mixtape_common::events::QueueEvent;
use tokio::sync::{broadcast, RwLock};

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes.
pub struct SharedState {
    /// Currently playing song as last derived by the selector
    /// (None when the queue is drained)
    pub current_song: RwLock<Option<Song>>,

    /// Event broadcaster for SSE fan-out
    pub event_tx: broadcast::Sender<QueueEvent>,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        Self {
            current_song: RwLock::new(None),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: QueueEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    /// Number of connected SSE viewers
    pub fn viewer_count(&self) -> usize {
        self.event_tx.receiver_count()
    }

    /// Get the cached current song
    pub async fn get_current_song(&self) -> Option<Song> {
        self.current_song.read().await.clone()
    }

    /// Replace the cached current song
    pub async fn set_current_song(&self, song: Option<Song>) {
        *self.current_song.write().await = song;
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

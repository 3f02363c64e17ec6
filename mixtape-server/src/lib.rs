//! Mixtape queue service
//!
//! Shared party music queue: participants submit YouTube/SoundCloud links,
//! a host browser plays them in order, everyone watches the queue, chat,
//! votes and leaderboard update live over SSE.
//!
//! The server is the single authority over queue state: hosts report
//! playback outcomes, they never mutate rows directly.

pub mod admission;
pub mod api;
pub mod auth;
pub mod chat;
pub mod error;
pub mod metadata;
pub mod queue;
pub mod state;
pub mod tts;

pub use error::{Error, Result};

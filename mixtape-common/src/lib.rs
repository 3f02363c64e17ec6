//! # Mixtape Common Library
//!
//! Shared code for the mixtape queue service:
//! - Database initialization, row models and settings access
//! - Event types (QueueEvent enum) fanned out over SSE
//! - Configuration / data folder resolution
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};

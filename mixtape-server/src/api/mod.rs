//! HTTP API for the queue service

pub mod handlers;
pub mod server;
pub mod sse;

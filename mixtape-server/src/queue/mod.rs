//! Queue core: the ordered song store, the playback selector and the
//! vote/moderation engine.

pub mod selector;
pub mod store;
pub mod votes;

//! Database layer: initialization, row models, settings access

pub mod init;
pub mod models;
pub mod settings;

pub use init::init_database;

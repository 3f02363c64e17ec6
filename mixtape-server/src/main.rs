//! Mixtape queue service - Main entry point
//!
//! Opens (or creates) the queue database, derives the current song, then
//! serves the HTTP API and SSE stream until the process is stopped.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixtape_server::api::server::{self, AppContext};
use mixtape_server::auth;
use mixtape_server::state::SharedState;

/// Environment variable holding the admin password (optional)
const ADMIN_PASSWORD_ENV: &str = "MIXTAPE_ADMIN_PASSWORD";

/// Command-line arguments for mixtape-server
#[derive(Parser, Debug)]
#[command(name = "mixtape-server")]
#[command(about = "Shared party music queue server")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "MIXTAPE_PORT")]
    port: u16,

    /// Folder holding the queue database
    #[arg(short, long, env = "MIXTAPE_DATA_FOLDER")]
    data_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixtape_server=debug,mixtape_common=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting mixtape queue service on port {}", args.port);

    // Resolve data folder (CLI > env > config file > platform default)
    let data_folder =
        mixtape_common::config::resolve_data_folder(args.data_folder.as_deref(), "MIXTAPE_DATA_FOLDER")
            .context("Failed to resolve data folder")?;
    info!("Data folder: {}", data_folder.display());

    let db_path = data_folder.join("mixtape.db");
    let db = mixtape_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    // An admin password in the environment (re)arms the admin gate
    match std::env::var(ADMIN_PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => {
            auth::set_admin_password(&db, &password)
                .await
                .context("Failed to store admin password")?;
            info!("Admin password configured from environment");
        }
        _ => {
            let stored = mixtape_common::db::settings::admin_password_hash(&db).await?;
            if stored.is_empty() {
                warn!("No admin password configured, admin endpoints are disabled");
            }
        }
    }

    let state = Arc::new(SharedState::new());
    let ctx = AppContext::new(db, state).context("Failed to build application context")?;

    // Derive the current song before accepting connections
    ctx.selector
        .refresh()
        .await
        .context("Failed to derive current song")?;

    server::run(args.port, ctx)
        .await
        .context("Server error")?;

    Ok(())
}

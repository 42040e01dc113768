//! sqbridge daemon - HTTP bridge for SQ console preamp control.
//!
//! Serves the channel mirror, show library, and preamp controls over HTTP,
//! and forwards changes to the console's TCP control port.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use sqbridge_core::{MemoryTransport, StateStore, Transport};
use sqbridge_db::Database;
use sqbridge_net::TcpTransport;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod persist;
mod server;
mod signals;

use config::Config;
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    init_logging(&config.daemon.log_level)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting sqbridge daemon");

    // Open database
    let db = match &config.database.path {
        Some(path) => Database::open_at(path.clone()),
        None => Database::open(),
    }
    .context("Failed to open database")?;
    info!("Database initialized");

    // Load the mirror
    let snapshot = db.load_snapshot().context("Failed to load channel state")?;
    info!(
        count = snapshot.channels.len(),
        show = %snapshot.current_show,
        "Loaded channels from database"
    );
    match db.console_host()?.or_else(|| config.console.host.clone()) {
        Some(host) => info!(%host, port = config.console.port, "Console configured"),
        None => warn!("No console host configured, set one through /api/config"),
    }

    let store = Arc::new(StateStore::from_snapshot(snapshot));
    let db = Arc::new(Mutex::new(db));
    let persistence = persist::spawn(Arc::clone(&store), Arc::clone(&db));

    if config.console.dry_run {
        warn!("Dry run: commands are kept in memory and never sent");
        let state = AppState::new(
            Arc::clone(&store),
            Arc::new(MemoryTransport::new()),
            Arc::clone(&db),
            &config.console,
        );
        serve(&config, state).await?;
    } else {
        let transport = TcpTransport::new(config.console.timeout());
        let state = AppState::new(
            Arc::clone(&store),
            Arc::new(transport),
            Arc::clone(&db),
            &config.console,
        );
        serve(&config, state).await?;
    }

    // Final flush in case the last change has not been written yet
    persistence.abort();
    persist::save(&store, &db);
    info!("Shutdown complete");

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(level)
            .add_directive(format!("sqbridge_daemon={level}").parse()?)
            .add_directive(format!("sqbridge_core={level}").parse()?)
            .add_directive(format!("sqbridge_net={level}").parse()?)
            .add_directive(format!("sqbridge_db={level}").parse()?),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

async fn serve<T: Transport>(config: &Config, state: AppState<T>) -> Result<()> {
    let addr: SocketAddr = config.http.bind;
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(signals::shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped");
    Ok(())
}

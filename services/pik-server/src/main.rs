//! PIK server binary.
//!
//! Wires the persistence, auth, ledger, and ingest layers into one
//! `AppState`, runs pending migrations, spawns the expiry reaper, and
//! serves the HTTP surface with graceful shutdown.

mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pik_auth::{AuthSuite, WebAuthnSettings};
use pik_db::Database;
use pik_events::EventBus;
use pik_ingest::{IngestEngine, LootEngine};
use pik_ledger::Ledger;

use crate::config::ServerConfig;

/// PIK — Persistent Identity Kernel server
#[derive(Parser, Debug)]
#[command(name = "pik-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut server_config = ServerConfig::load()?;
    if let Some(port) = args.port {
        server_config.server.port = port;
    }

    init_logging(&server_config.logging)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting pik-server");

    let db = Arc::new(Database::connect(&(&server_config.database).into()).await?);
    if server_config.database.run_migrations {
        db.migrate().await?;
    }

    let bus = Arc::new(EventBus::new());
    let ledger = Ledger::new(db.event_repo(), bus);

    let webauthn_settings = WebAuthnSettings {
        rp_name: server_config.webauthn.rp_name.clone(),
        rp_id: server_config.webauthn.rp_id.clone(),
        origin: server_config.webauthn.origin.clone(),
    };
    let auth = Arc::new(AuthSuite::new(
        &db,
        webauthn_settings,
        server_config.webauthn.session_ttl_secs,
        ledger.clone(),
    )?);

    let loot = LootEngine::new(db.loot_repo(), db.identity_repo(), db.gear_repo(), ledger.clone());
    let ingest = IngestEngine::new(db.identity_repo(), ledger.clone(), db.config_repo(), auth.consent.clone(), loot.clone());

    db.config_repo().seed_defaults(&pik_core::config_keys::seed_defaults()).await?;

    let state = Arc::new(pik_api::AppState::new(db, auth.clone(), ledger, ingest, loot));

    let reaper = auth.reaper.clone();
    tokio::spawn(async move { reaper.run().await });

    let app = pik_api::create_router(state, &server_config.api.cors_origins);

    let addr = server_config.server.socket_addr();
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.server.shutdown_timeout()))
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber.with(fmt::layer().json().with_target(true)).init(),
        _ => subscriber.with(fmt::layer().pretty().with_target(true)).init(),
    }

    Ok(())
}

async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }

    tracing::info!(timeout_secs = timeout.as_secs(), "waiting for in-flight requests");
    tokio::time::sleep(timeout).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_port_override_parses() {
        let args = Args::parse_from(["pik-server", "--port", "9090"]);
        assert_eq!(args.port, Some(9090));
    }
}

//! Five Crowns multiplayer game server.
//!
//! One process hosts the REST facade, the realtime socket, and the hub of
//! per-game actors, backed by PostgreSQL for accounts, games, and the
//! append-only event log.

mod api;
mod config;
mod logging;
mod mail;
mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use pico_args::Arguments;

use five_crowns::auth::{AuthManager, MediaTokenMinter};
use five_crowns::db::repository::{
    PgFriendshipRepository, PgGameRepository, PgNotificationRepository, PgUserDirectory,
};
use five_crowns::db::{Database, EventStore};
use five_crowns::hub::{ConnectionRegistry, GameRegistry};
use five_crowns::notify::NotificationService;

use config::ServerConfig;
use mail::Mailer;

const HELP: &str = "\
Run the Five Crowns game server

USAGE:
  fc_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  SESSION_SECRET           Session-signing secret (required)
  SESSION_TTL_DAYS         Session token lifetime in days [default: 7]
  SMTP_HOST / SMTP_PORT / SMTP_USERNAME / SMTP_PASSWORD / SMTP_FROM
                           Outbound mail coordinates
  PUBLIC_BASE_URL          Base URL used in e-mailed links
  MEDIA_URL                Media service URL (required)
  MEDIA_API_KEY            Media service API key (required)
  MEDIA_API_SECRET         Media token signing secret (required)
  METRICS_BIND             Optional Prometheus exporter bind address
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }
    let bind_override: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let db_override: Option<String> = pargs.opt_value_from_str("--db-url")?;

    logging::init();

    let config = ServerConfig::from_env(bind_override, db_override)
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

    tracing::info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {e}"))?;
    let pool = db.pool().clone();
    tracing::info!("Database connected");

    // Managers and repositories
    let auth = Arc::new(AuthManager::new(
        pool.clone(),
        config.security.session_secret.clone(),
        config.security.session_ttl_days,
    ));
    let media = Arc::new(MediaTokenMinter::new(config.media.clone()));
    let users = Arc::new(PgUserDirectory::new(pool.clone()));
    let friends = Arc::new(PgFriendshipRepository::new(pool.clone()));
    let games = Arc::new(PgGameRepository::new(pool.clone()));
    let notification_repo = Arc::new(PgNotificationRepository::new(pool.clone()));
    let connections = Arc::new(ConnectionRegistry::new());
    let notifications = Arc::new(NotificationService::new(
        notification_repo,
        connections.clone(),
    ));
    let event_store = EventStore::new(pool.clone());
    let registry = Arc::new(GameRegistry::new(event_store.clone(), games.clone()));
    let mailer = Arc::new(Mailer::new(
        config.smtp.clone(),
        config.public_base_url.clone(),
    ));

    // Bring every active game back up before accepting traffic.
    match registry.rehydrate_active().await {
        Ok(count) => {
            metrics::games_rehydrated(count as u64);
            tracing::info!("rehydrated {count} active game(s)");
        }
        Err(err) => tracing::error!("rehydration scan failed: {err}"),
    }

    if let Some(addr) = config.metrics_bind {
        match metrics::init_metrics(addr) {
            Ok(()) => tracing::info!("metrics exporter listening on {addr}"),
            Err(err) => tracing::error!("metrics exporter failed: {err}"),
        }
    }

    let api_state = api::AppState {
        auth,
        media,
        registry: registry.clone(),
        users,
        friends,
        games,
        notifications,
        connections,
        event_store,
        mailer,
        pool,
    };
    let app = api::create_router(api_state);

    tracing::info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {e}", config.bind))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;

    // Drain every game queue before dropping the pool: queued commands
    // still execute and their events persist.
    tracing::info!("Shutting down, draining game queues");
    registry.shutdown().await;
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
}

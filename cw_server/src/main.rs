//! Coaching wallet HTTP server.
//!
//! Serves the wallet and billable-session API on top of a PostgreSQL
//! backed ledger, with Prometheus metrics on an optional second port.

mod api;
mod config;
mod logging;
mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use coaching_wallet::db::Database;
use coaching_wallet::payment::StaticPaymentProvider;
use coaching_wallet::wallet::WalletService;
use config::ServerConfig;
use ctrlc::set_handler;
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Run the coaching wallet API server

USAGE:
  cw_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus exporter bind address (disabled when unset)
  DATABASE_URL             PostgreSQL connection string
  WALLET_CURRENCY          Wallet currency code [default: NPR]
  TOPUP_BONUS_TIER_*       Bonus tier thresholds and percentages
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind_override: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url_override: Option<String> = pargs.opt_value_from_str("--db-url")?;

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    logging::init();

    let server_config = ServerConfig::from_env(bind_override, database_url_override)?;
    server_config.validate()?;

    info!("Starting coaching wallet server at {}", server_config.bind);

    if let Some(metrics_bind) = server_config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics exposed at http://{metrics_bind}/metrics");
    }

    info!(
        "Connecting to database: {}",
        server_config.database.database_url
    );
    let db = Database::new(&server_config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    info!("Database connected successfully");

    let pool = Arc::new(db.pool().clone());
    let wallet = Arc::new(WalletService::new(
        pool.clone(),
        server_config.billing.clone(),
        Arc::new(StaticPaymentProvider::default()),
    ));

    let api_state = api::AppState { wallet, pool };
    let app = api::create_router(api_state);

    let listener = tokio::net::TcpListener::bind(server_config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", server_config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        server_config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
}

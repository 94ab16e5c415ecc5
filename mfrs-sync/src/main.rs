//! mfrs-sync - Multi-Factor Risk Service
//!
//! Serves risk pies over HTTP and refreshes FHIR risk assessments from
//! REDCap on a cron schedule or on `POST /refresh`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mfrs_common::config::{self, ConfigOverrides, ServiceConfig, TomlConfig};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mfrs_sync::db::{self, PieStore};
use mfrs_sync::services::{schedule_refresh, RefreshService};
use mfrs_sync::AppState;

/// Command-line arguments for mfrs-sync
#[derive(Parser, Debug)]
#[command(name = "mfrs-sync")]
#[command(about = "Syncs REDCap risk surveys to FHIR risk assessments")]
#[command(version)]
struct Args {
    /// HTTP host and port to listen on (e.g. ":9000")
    #[arg(long, env = "HTTP_HOST_AND_PORT")]
    http: Option<String>,

    /// FHIR server base URL
    #[arg(long, env = "FHIR_URL")]
    fhir: Option<String>,

    /// REDCap API URL
    #[arg(long, env = "REDCAP_URL")]
    redcap: Option<String>,

    /// REDCap API token
    #[arg(long, env = "REDCAP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Cron expression for scheduled refreshes, seconds field first
    #[arg(long, env = "REDCAP_CRON")]
    cron: Option<String>,

    /// SQLite database for risk pies
    #[arg(long, env = "MFRS_DATABASE")]
    database: Option<PathBuf>,

    /// Public base URL for pies (defaults to http://<host>:<port>/pies)
    #[arg(long = "pie-url", env = "MFRS_PIE_URL")]
    pie_url: Option<String>,

    /// Timeout in seconds for each REDCap or FHIR request
    #[arg(long = "http-timeout", env = "MFRS_HTTP_TIMEOUT_SECS")]
    http_timeout: Option<u64>,

    /// Timeout in seconds for a whole refresh cycle
    #[arg(long = "cycle-timeout", env = "MFRS_CYCLE_TIMEOUT_SECS")]
    cycle_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long = "log-level", env = "MFRS_LOG_LEVEL")]
    log_level: Option<String>,

    /// TOML config file
    #[arg(long, env = "MFRS_CONFIG")]
    config: Option<PathBuf>,
}

impl From<Args> for ConfigOverrides {
    fn from(args: Args) -> Self {
        Self {
            http: args.http,
            fhir_url: args.fhir,
            redcap_url: args.redcap,
            redcap_token: args.token,
            cron: args.cron,
            database_path: args.database,
            pie_base_url: args.pie_url,
            http_timeout_secs: args.http_timeout,
            cycle_timeout_secs: args.cycle_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config file is read before tracing starts so its log level applies
    let file = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load config file")?;
    let log_level = config::resolve_log_level(args.log_level.clone(), &file);
    let default_directive = format!("mfrs_sync={0},mfrs_common={0},tower_http=info", log_level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting mfrs-sync v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let config = ServiceConfig::resolve(args.into(), file, config::discover_host)
        .context("Invalid configuration")?;
    info!("FHIR server: {}", config.fhir_url);
    info!("REDCap server: {}", config.redcap_url);
    info!("Pie base URL: {}", config.pie_base_url);

    info!("Database: {}", config.database_path.display());
    let pool = db::init_database_pool(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let pies = PieStore::new(pool);

    let refresh = Arc::new(
        RefreshService::from_config(&config, pies.clone())
            .context("Failed to initialize refresh service")?,
    );

    let mut scheduler = schedule_refresh(&config.cron, Arc::clone(&refresh))
        .await
        .with_context(|| format!("Invalid refresh schedule: {}", config.cron))?;
    scheduler
        .start()
        .await
        .context("Failed to start refresh scheduler")?;

    let app = mfrs_sync::build_router(AppState::new(pies, refresh));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler
        .shutdown()
        .await
        .context("Failed to stop refresh scheduler")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

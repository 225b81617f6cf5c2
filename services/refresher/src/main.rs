//! Forecast refresh service.
//!
//! Polls the configured forecast sources for new issuances, normalizes
//! what it retrieves into the canonical schema, and publishes it to the
//! in-memory store served over the status API:
//! - Metadata-only freshness probes before any bulk transfer
//! - Per-source fault isolation (a broken source leaves the others alone)
//! - Snapshot cache for restart durability and the freshness baseline
//! - HTTP status/read API for monitoring and the rendering layer

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use forecast_store::ForecastStore;
use refresher::config::RefresherConfig;
use refresher::scheduler::Scheduler;
use refresher::server::{self, ServerState};
use source_adapters::{GlobalAdapter, RegionalAdapter, SourceAdapter};
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "refresher")]
#[command(about = "Forecast refresh and normalization service")]
struct Args {
    /// Path to the service configuration file
    #[arg(long, env = "REFRESHER_CONFIG", default_value = "config/sources.yaml")]
    config: PathBuf,

    /// Run a single refresh tick and exit (vs continuous polling)
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Port for status HTTP server
    #[arg(long, env = "STATUS_PORT", default_value = "8082")]
    status_port: u16,

    /// Disable status HTTP server
    #[arg(long)]
    no_status_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting forecast refresher");

    let config = RefresherConfig::load(&args.config)?;

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(GlobalAdapter::new(config.global_config())?),
        Arc::new(RegionalAdapter::new(config.regional_config())?),
    ];

    let store = Arc::new(ForecastStore::new());
    let scheduler = Arc::new(Scheduler::new(
        adapters,
        store.clone(),
        config.refresh_interval(),
        config.operation_timeout(),
    ));

    // Republish whatever the snapshot caches hold, so readers have data
    // before the first upstream round-trip completes.
    scheduler.seed().await;

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start status server (unless disabled or in --once mode)
    if !args.no_status_server && !args.once {
        let server_state = Arc::new(ServerState {
            store: store.clone(),
            scheduler: scheduler.clone(),
        });
        let status_port = args.status_port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(server_state, status_port).await {
                tracing::error!(error = %e, "Status server failed");
            }
        });
    }

    if args.once {
        info!("Running single refresh tick");
        scheduler.run_all().await;
    } else {
        info!("Starting continuous polling");

        // Handle Ctrl+C
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown_tx_clone.send(()).ok();
        });

        scheduler.run_forever(shutdown_tx.subscribe()).await;
    }

    for status in scheduler.status_report() {
        info!(
            source = %status.source,
            cursor = %status.cursor,
            published = status.published,
            up_to_date = status.up_to_date,
            not_ready = status.not_ready,
            failed = status.failed,
            "Refresh session complete"
        );
    }

    Ok(())
}

//! Pointdraw Worker
//!
//! Headless background worker for the sweepstakes drawing engine: closes
//! ticket sales, executes due drawings, and processes fulfillment timeouts
//! on a fixed sweep interval.

mod config;
mod shutdown;

use clap::Parser;
use config::{FileConfig, get_database_url};
use pointdraw_core::events::{Notification, NotificationReceiver, notification_channel};
use pointdraw_core::processors::DrawingWorker;
use pointdraw_core::services::{FulfillmentService, LifecycleService, SelectionService};
use pointdraw_core::store::PgStores;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Pointdraw - points-based sweepstakes drawing worker
#[derive(Parser, Debug)]
#[command(name = "pointdraw-worker")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./pointdraw-config.toml")]
    config: PathBuf,

    /// Override the sweep interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting pointdraw-worker v{}", env!("CARGO_PKG_VERSION"));

    let file_config = FileConfig::load(&args.config).map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    let interval_secs = args
        .interval
        .unwrap_or(file_config.worker.sweep_interval_secs);

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(file_config.database.max_connections)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&db_pool).await.map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            e
        })?;
        tracing::info!("Migrations completed successfully");
    }

    let stores = Arc::new(PgStores::new(db_pool.clone()));
    let (notification_tx, notification_rx) = notification_channel();

    let lifecycle = Arc::new(LifecycleService::new(stores.clone()));
    let selection = Arc::new(SelectionService::new(
        stores.clone(),
        stores.clone(),
        stores.clone(),
        stores.clone(),
        Some(notification_tx.clone()),
    ));
    let fulfillment = Arc::new(FulfillmentService::new(
        stores.clone(),
        Some(notification_tx),
    ));

    let worker = DrawingWorker::new(stores, lifecycle, selection, fulfillment);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx, Duration::from_secs(interval_secs)));
    let dispatch_handle = tokio::spawn(dispatch_notifications(notification_rx));

    shutdown::shutdown_signal().await;

    // Stop the sweep loop; the senders drop with it and the dispatcher
    // drains whatever is left in the channel.
    let _ = shutdown_tx.send(true);
    worker_handle.await?;
    dispatch_handle.await?;

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Worker shutdown complete");

    Ok(())
}

/// Log engine notifications until every sender is gone. A real deployment
/// would hand these to an email or push dispatcher.
async fn dispatch_notifications(mut rx: NotificationReceiver) {
    while let Some(notification) = rx.recv().await {
        match notification {
            Notification::DrawingCompleted {
                drawing_id,
                winner_count,
                total_tickets,
            } => {
                tracing::info!(
                    %drawing_id,
                    winner_count,
                    total_tickets,
                    "Notification: drawing completed"
                );
            }
            Notification::FulfillmentStatusChanged {
                fulfillment_id,
                user_id,
                new_status,
            } => {
                tracing::info!(
                    %fulfillment_id,
                    %user_id,
                    %new_status,
                    "Notification: fulfillment status changed"
                );
            }
        }
    }
    tracing::debug!("Notification dispatcher drained");
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

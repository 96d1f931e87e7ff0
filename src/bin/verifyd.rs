//! Verification daemon
//!
//! Wires the record store, identity gateway, reconciliation engine and
//! trigger controller together and runs the notification listener until
//! Ctrl+C.
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/car_dealer \
//! GATEWAY_TOKEN_KEY=... \
//! cargo run --bin verifyd
//! ```

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dealer_verify::config::VerifyConfig;
use dealer_verify::gateway::{IdentityGateway, SpringScanClient};
use dealer_verify::notifier::EventBroadcaster;
use dealer_verify::store::{PgRecordStore, RecordStore};
use dealer_verify::{ReconciliationEngine, TriggerController};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = VerifyConfig::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connection established");

    let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool.clone()));
    let gateway: Arc<dyn IdentityGateway> = Arc::new(
        SpringScanClient::new(&config.gateway).context("Failed to build gateway client")?,
    );
    let events = EventBroadcaster::default();
    let engine = Arc::new(ReconciliationEngine::new(store.clone(), gateway));
    let controller = TriggerController::new(engine, store, events);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    controller.run(&pool, shutdown_rx).await?;
    Ok(())
}

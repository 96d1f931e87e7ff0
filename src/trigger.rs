//! Trigger Controller
//!
//! Subscribes to the record store's LISTEN/NOTIFY channels and drives the
//! reconciliation engine: a `threshold_reached` notification runs the full
//! pending batch once, bracketed by started/completed (or failed) broadcasts;
//! `customer_changes` rows are republished to subscribers as-is. A manual
//! invocation path shares the same completion contract.

use serde::Deserialize;
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::{BatchSummary, EngineError, ReconciliationEngine};
use crate::notifier::{EventBroadcaster, VerificationEvent};
use crate::store::RecordStore;

/// Row-change notifications (insert/update/delete payloads).
pub const CHANNEL_RECORD_CHANGES: &str = "customer_changes";
/// Threshold-crossing notifications carrying the pending-row count.
pub const CHANNEL_THRESHOLD: &str = "threshold_reached";

/// Backoff after a notification stream error.
const ERROR_BACKOFF_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Debug, Deserialize)]
struct ThresholdPayload {
    count: i64,
}

pub struct TriggerController {
    engine: Arc<ReconciliationEngine>,
    store: Arc<dyn RecordStore>,
    events: EventBroadcaster,
}

impl TriggerController {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        store: Arc<dyn RecordStore>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            engine,
            store,
            events,
        }
    }

    /// Listener loop; blocks until the shutdown flag flips.
    ///
    /// Handler errors never escape the loop: a failed run is reported via
    /// the failed broadcast and the listener keeps serving notifications.
    pub async fn run(
        &self,
        pool: &PgPool,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), TriggerError> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener
            .listen_all([CHANNEL_RECORD_CHANGES, CHANNEL_THRESHOLD])
            .await?;
        info!("Trigger controller listening for store notifications");

        loop {
            if *shutdown.borrow() {
                info!("Trigger controller shutting down");
                break;
            }

            tokio::select! {
                notification = listener.recv() => {
                    match notification {
                        Ok(n) => self.handle_notification(n.channel(), n.payload()).await,
                        Err(e) => {
                            error!(error = %e, "Notification stream error");
                            tokio::time::sleep(Duration::from_millis(ERROR_BACKOFF_MS)).await;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Trigger controller shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_notification(&self, channel: &str, payload: &str) {
        match channel {
            CHANNEL_RECORD_CHANGES => match serde_json::from_str::<Value>(payload) {
                Ok(value) => self.events.publish(VerificationEvent::DbChanged { payload: value }),
                Err(e) => warn!(error = %e, "Failed to parse row-change payload"),
            },
            CHANNEL_THRESHOLD => {
                let count = match serde_json::from_str::<ThresholdPayload>(payload) {
                    Ok(p) => p.count,
                    Err(e) => {
                        warn!(error = %e, "Failed to parse threshold payload");
                        return;
                    }
                };

                info!(count, "Pending-record threshold reached, starting verification");
                self.events.publish(VerificationEvent::VerificationTriggered {
                    message: format!(
                        "Threshold reached at {count} records — starting verification process."
                    ),
                    count,
                });

                // Completion/failure is already broadcast inside.
                let _ = self.execute_run().await;
            }
            other => debug!(channel = other, "Ignoring notification on unknown channel"),
        }
    }

    /// Manual invocation path (operator-triggered), independent of the
    /// threshold event. Idempotent: completed records are excluded from the
    /// batch and claims are conditional.
    pub async fn run_verification(&self) -> Result<BatchSummary, TriggerError> {
        info!("Manual verification run requested");
        self.execute_run().await
    }

    async fn execute_run(&self) -> Result<BatchSummary, TriggerError> {
        match self.engine.process_pending().await {
            Ok(summary) => {
                self.events.publish(VerificationEvent::VerificationCompleted {
                    message: "Verification process completed.".to_string(),
                });
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "Verification run failed");
                self.events.publish(VerificationEvent::VerificationFailed {
                    message: "Verification process failed.".to_string(),
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Row-level fan-out for a document the extraction worker finished.
    ///
    /// Prefers the stored row (the worker usually inserted it already);
    /// falls back to the raw extraction payload when the row is not yet
    /// visible.
    pub async fn document_processed(
        &self,
        job_id: Uuid,
        customer_id: Option<i64>,
        extracted: Value,
    ) {
        let payload = match customer_id {
            Some(id) => match self.store.find_by_customer_id(id).await {
                Ok(Some(record)) => {
                    serde_json::to_value(&record).unwrap_or_else(|_| extracted)
                }
                Ok(None) => extracted,
                Err(e) => {
                    warn!(customer_id = id, error = %e, "Failed to load processed record");
                    extracted
                }
            },
            None => extracted,
        };

        self.events.publish(VerificationEvent::DocumentProcessed { job_id, payload });
    }
}

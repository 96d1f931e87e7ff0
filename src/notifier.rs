//! Realtime Event Broadcast
//!
//! In-process publish channel for verification lifecycle and row-level
//! events. The websocket fan-out belongs to the serving layer: it
//! subscribes here and forwards events verbatim. No persistence or replay —
//! subscribers only see events published after they subscribe.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Events delivered to connected clients, tagged with the socket event
/// names the frontend listens for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum VerificationEvent {
    /// Threshold fired; a verification run is starting.
    VerificationTriggered { message: String, count: i64 },
    /// A verification run finished.
    VerificationCompleted { message: String },
    /// The engine invocation itself errored.
    VerificationFailed { message: String, error: String },
    /// A row-level change in the record store (insert/update/delete).
    DbChanged { payload: Value },
    /// The extraction worker finished a document for an upload job.
    DocumentProcessed {
        #[serde(rename = "jobId")]
        job_id: Uuid,
        payload: Value,
    },
}

/// Cloneable handle over a broadcast channel of verification events.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<VerificationEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VerificationEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers. Zero subscribers is not
    /// an error; the event is simply dropped.
    pub fn publish(&self, event: VerificationEvent) {
        match self.tx.send(event) {
            Ok(subscribers) => debug!(subscribers, "Broadcast verification event"),
            Err(_) => debug!("No subscribers for verification event"),
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_socket_names() {
        let event = VerificationEvent::VerificationTriggered {
            message: "Threshold reached at 10 records — starting verification process.".to_string(),
            count: 10,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "verificationTriggered");
        assert_eq!(value["data"]["count"], 10);

        let job_id = Uuid::new_v4();
        let event = VerificationEvent::DocumentProcessed {
            job_id,
            payload: json!({ "customer_id": 336 }),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "documentProcessed");
        assert_eq!(value["data"]["jobId"], job_id.to_string());
    }

    #[tokio::test]
    async fn publish_reaches_current_subscribers_only() {
        let broadcaster = EventBroadcaster::default();

        // No subscribers yet: publish must not error.
        broadcaster.publish(VerificationEvent::VerificationCompleted {
            message: "lost".to_string(),
        });

        let mut rx = broadcaster.subscribe();
        broadcaster.publish(VerificationEvent::VerificationCompleted {
            message: "seen".to_string(),
        });

        match rx.recv().await.unwrap() {
            VerificationEvent::VerificationCompleted { message } => assert_eq!(message, "seen"),
            other => panic!("unexpected event: {other:?}"),
        }
        // The pre-subscription event was not replayed.
        assert!(rx.try_recv().is_err());
    }
}

//! Push-notification fan-out. The engine hands over one payload; this
//! crate batches it across registered endpoints and reports counts.
//! Actual delivery transport lives behind [`PushTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use uuid::Uuid;

use souq_core::models::PushEndpoint;
use souq_core::notify::{DispatchReport, Notification, NotificationDispatcher};
use souq_core::repository::PushEndpointRepository;

/// FCM caps multicast sends at 500 tokens per request.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// What happened to a single delivery batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub delivered: u64,
    pub failed: u64,
    /// Endpoints the provider rejected as gone; they get pruned.
    pub invalid: Vec<Uuid>,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(
        &self,
        endpoints: &[PushEndpoint],
        note: &Notification,
    ) -> Result<BatchOutcome, Box<dyn std::error::Error + Send + Sync>>;
}

/// Dispatcher that fans a payload out to active endpoints in batches,
/// prunes invalid endpoints, and reports totals.
pub struct BatchingDispatcher {
    endpoints: Arc<dyn PushEndpointRepository>,
    transport: Arc<dyn PushTransport>,
    batch_size: usize,
}

impl BatchingDispatcher {
    pub fn new(endpoints: Arc<dyn PushEndpointRepository>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            endpoints,
            transport,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl NotificationDispatcher for BatchingDispatcher {
    async fn send_to_all(
        &self,
        note: Notification,
    ) -> Result<DispatchReport, Box<dyn std::error::Error + Send + Sync>> {
        let endpoints = self.endpoints.active_endpoints(note.city_id).await?;

        if endpoints.is_empty() {
            info!("no registered endpoints, nothing to dispatch");
            return Ok(DispatchReport::default());
        }

        let mut sent = 0u64;
        let mut failed = 0u64;
        let mut invalid: Vec<Uuid> = Vec::new();

        for (i, batch) in endpoints.chunks(self.batch_size).enumerate() {
            match self.transport.deliver(batch, &note).await {
                Ok(outcome) => {
                    info!(
                        batch = i + 1,
                        delivered = outcome.delivered,
                        failed = outcome.failed,
                        "notification batch delivered"
                    );
                    sent += outcome.delivered;
                    failed += outcome.failed;
                    invalid.extend(outcome.invalid);
                }
                Err(e) => {
                    error!(batch = i + 1, "notification batch failed: {e}");
                    failed += batch.len() as u64;
                }
            }
        }

        let removed = if invalid.is_empty() {
            0
        } else {
            self.endpoints.remove_endpoints(&invalid).await?
        };

        info!(sent, failed, removed, "notification fan-out complete");

        Ok(DispatchReport {
            sent,
            failed,
            removed,
        })
    }
}

/// Transport that only logs. Stands in until a provider is wired up.
pub struct NoopTransport;

#[async_trait]
impl PushTransport for NoopTransport {
    async fn deliver(
        &self,
        endpoints: &[PushEndpoint],
        note: &Notification,
    ) -> Result<BatchOutcome, Box<dyn std::error::Error + Send + Sync>> {
        info!(count = endpoints.len(), title = %note.title, "noop transport: dropping batch");
        Ok(BatchOutcome {
            delivered: endpoints.len() as u64,
            failed: 0,
            invalid: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souq_store::MemoryStore;
    use std::sync::Mutex;

    /// Counts calls and rejects any token containing "stale".
    struct FakeTransport {
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl PushTransport for FakeTransport {
        async fn deliver(
            &self,
            endpoints: &[PushEndpoint],
            _note: &Notification,
        ) -> Result<BatchOutcome, Box<dyn std::error::Error + Send + Sync>> {
            self.calls.lock().unwrap().push(endpoints.len());
            let mut outcome = BatchOutcome::default();
            for e in endpoints {
                if e.token.contains("stale") {
                    outcome.failed += 1;
                    outcome.invalid.push(e.id);
                } else {
                    outcome.delivered += 1;
                }
            }
            Ok(outcome)
        }
    }

    #[tokio::test]
    async fn fans_out_in_batches_and_prunes_invalid_endpoints() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..5 {
            let account = store.seed_account(true);
            let token = if i == 4 {
                "stale-token".to_string()
            } else {
                format!("token-{i}")
            };
            store.seed_endpoint(account.id, &token);
        }
        // An inactive account's endpoint is skipped entirely.
        let inactive = store.seed_account(false);
        store.seed_endpoint(inactive.id, "token-inactive");

        let transport = Arc::new(FakeTransport {
            calls: Mutex::new(Vec::new()),
        });
        let dispatcher =
            BatchingDispatcher::new(store.clone(), transport.clone()).with_batch_size(2);

        let report = dispatcher
            .send_to_all(Notification::broadcast("t", "b", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(report.sent, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.removed, 1);
        // 5 active endpoints in batches of 2 -> 3 calls.
        assert_eq!(transport.calls.lock().unwrap().len(), 3);
        assert_eq!(store.endpoint_count(), 5);
    }

    #[tokio::test]
    async fn empty_registry_is_a_clean_noop() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = BatchingDispatcher::new(store, Arc::new(NoopTransport));

        let report = dispatcher
            .send_to_all(Notification::broadcast("t", "b", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(report.removed, 0);
    }
}

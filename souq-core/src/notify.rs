use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A push payload handed to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// When set, fan-out is restricted to endpoints of accounts in this city.
    pub city_id: Option<Uuid>,
    pub data: serde_json::Value,
}

impl Notification {
    pub fn broadcast(title: impl Into<String>, body: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            city_id: None,
            data,
        }
    }
}

/// Counts reported back from a fan-out. Informational only: the engine
/// never retries on the basis of these numbers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DispatchReport {
    pub sent: u64,
    pub failed: u64,
    pub removed: u64,
}

/// Notification fan-out contract. Delivery transport is out of scope for
/// the engine; it only hands over a payload and reads the counts.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_to_all(
        &self,
        note: Notification,
    ) -> Result<DispatchReport, Box<dyn std::error::Error + Send + Sync>>;
}

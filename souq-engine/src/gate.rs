use std::sync::Arc;

use uuid::Uuid;

use souq_core::repository::MerchantRepository;
use souq_core::{EngineError, EngineResult};
use souq_store::app_config::TrustPolicy;

#[derive(Debug, Clone)]
pub struct PublishDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

/// Read-only check of whether a merchant may publish new listings.
#[derive(Clone)]
pub struct EligibilityGate {
    merchants: Arc<dyn MerchantRepository>,
    policy: TrustPolicy,
}

impl EligibilityGate {
    pub fn new(merchants: Arc<dyn MerchantRepository>, policy: TrustPolicy) -> Self {
        Self { merchants, policy }
    }

    pub async fn can_publish(&self, merchant_id: Uuid) -> EngineResult<PublishDecision> {
        let merchant = self
            .merchants
            .get_merchant(merchant_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("merchant {merchant_id} not found")))?;

        if merchant.trust_score < self.policy.publish_threshold {
            return Ok(PublishDecision {
                allowed: false,
                reason: Some(format!(
                    "Trust score too low ({}/{}). Improve your reputation to publish new listings.",
                    merchant.trust_score, self.policy.publish_threshold
                )),
            });
        }

        Ok(PublishDecision {
            allowed: true,
            reason: None,
        })
    }
}

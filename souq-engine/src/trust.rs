use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use souq_core::repository::MerchantRepository;
use souq_core::{EngineError, EngineResult};
use souq_store::app_config::TrustPolicy;

/// Why a trust score changed. Each reason carries its fixed delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustChangeReason {
    SuspiciousListing,
    AutoHiddenListing,
    AdminDeletedListing,
    HighViewsBonus,
    HighSavesBonus,
}

impl TrustChangeReason {
    pub fn delta(self) -> i32 {
        match self {
            TrustChangeReason::SuspiciousListing => -2,
            TrustChangeReason::AutoHiddenListing => -5,
            TrustChangeReason::AdminDeletedListing => -10,
            TrustChangeReason::HighViewsBonus => 1,
            TrustChangeReason::HighSavesBonus => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrustChangeReason::SuspiciousListing => "suspicious_listing_created",
            TrustChangeReason::AutoHiddenListing => "listing_auto_hidden",
            TrustChangeReason::AdminDeletedListing => "admin_deleted_listing",
            TrustChangeReason::HighViewsBonus => "high_views_bonus",
            TrustChangeReason::HighSavesBonus => "high_saves_bonus",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrustAdjustment {
    pub new_score: i32,
    /// True only when this adjustment performed the auto-block transition.
    pub blocked: bool,
}

/// The only legal path for changing a merchant's trust score. The score
/// mutation, its audit entry, and the auto-block transition are committed
/// atomically by the repository; concurrent adjustments on the same
/// merchant serialize there rather than racing through read-then-write.
#[derive(Clone)]
pub struct TrustScoreLedger {
    merchants: Arc<dyn MerchantRepository>,
    policy: TrustPolicy,
}

impl TrustScoreLedger {
    pub fn new(merchants: Arc<dyn MerchantRepository>, policy: TrustPolicy) -> Self {
        Self { merchants, policy }
    }

    pub async fn adjust(
        &self,
        merchant_id: Uuid,
        delta: i32,
        reason: &str,
    ) -> EngineResult<TrustAdjustment> {
        let outcome = self
            .merchants
            .adjust_trust(merchant_id, delta, self.policy.block_threshold, reason)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("merchant {merchant_id} not found")))?;

        info!(
            merchant = %merchant_id,
            reason,
            "trust score adjusted: {} -> {}",
            outcome.previous_score,
            outcome.new_score,
        );

        if outcome.blocked {
            warn!(
                merchant = %merchant_id,
                score = outcome.new_score,
                "merchant auto-blocked due to low trust score"
            );
        }

        Ok(TrustAdjustment {
            new_score: outcome.new_score,
            blocked: outcome.blocked,
        })
    }

    /// Adjusts by the reason's fixed delta.
    pub async fn apply(
        &self,
        merchant_id: Uuid,
        reason: TrustChangeReason,
    ) -> EngineResult<TrustAdjustment> {
        self.adjust(merchant_id, reason.delta(), reason.as_str()).await
    }
}

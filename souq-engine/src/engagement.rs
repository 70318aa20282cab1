use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use souq_core::models::SaveResult;
use souq_core::repository::{EngagementRepository, ListingRepository};
use souq_core::{EngineError, EngineResult};
use souq_store::app_config::EngagementPolicy;

use crate::trust::{TrustChangeReason, TrustScoreLedger};

/// Watches per-listing engagement counters and awards one-time trust
/// bonuses when a threshold is crossed. The flag-check-and-set is a single
/// conditional update in the repository, so a threshold crossed by two
/// concurrent events pays out exactly once.
#[derive(Clone)]
pub struct EngagementBonusTracker {
    listings: Arc<dyn ListingRepository>,
    engagement: Arc<dyn EngagementRepository>,
    ledger: TrustScoreLedger,
    policy: EngagementPolicy,
}

impl EngagementBonusTracker {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        engagement: Arc<dyn EngagementRepository>,
        ledger: TrustScoreLedger,
        policy: EngagementPolicy,
    ) -> Self {
        Self {
            listings,
            engagement,
            ledger,
            policy,
        }
    }

    /// Records a view. Returns the new view count.
    pub async fn record_view(&self, listing_id: Uuid) -> EngineResult<i64> {
        let listing = self
            .listings
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("listing {listing_id} not found")))?;

        let views = self.engagement.increment_views(listing_id).await?;

        if views >= self.policy.view_bonus_threshold
            && self
                .engagement
                .try_award_view_bonus(listing_id, self.policy.view_bonus_threshold)
                .await?
        {
            info!(listing = %listing_id, views, "view threshold crossed, awarding trust bonus");
            self.ledger
                .apply(listing.merchant_id, TrustChangeReason::HighViewsBonus)
                .await?;
        }

        Ok(views)
    }

    /// Records a save by an account. Duplicate saves are rejected. Returns
    /// the new save count.
    pub async fn record_save(&self, listing_id: Uuid, account_id: Uuid) -> EngineResult<i64> {
        let listing = self
            .listings
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("listing {listing_id} not found")))?;

        let saves = match self.engagement.record_save(account_id, listing_id).await? {
            SaveResult::AlreadySaved => {
                return Err(EngineError::Validation(
                    "you have already saved this listing".to_string(),
                ));
            }
            SaveResult::Recorded { saves } => saves,
        };

        if saves >= self.policy.save_bonus_threshold
            && self
                .engagement
                .try_award_save_bonus(listing_id, self.policy.save_bonus_threshold)
                .await?
        {
            info!(listing = %listing_id, saves, "save threshold crossed, awarding trust bonus");
            self.ledger
                .apply(listing.merchant_id, TrustChangeReason::HighSavesBonus)
                .await?;
        }

        Ok(saves)
    }

    /// Records a click. Clicks carry no bonus.
    pub async fn record_click(&self, listing_id: Uuid) -> EngineResult<i64> {
        if self.listings.get_listing(listing_id).await?.is_none() {
            return Err(EngineError::NotFound(format!("listing {listing_id} not found")));
        }
        Ok(self.engagement.increment_clicks(listing_id).await?)
    }
}

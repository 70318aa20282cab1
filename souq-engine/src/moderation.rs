use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use souq_core::models::{Listing, RankedListing};
use souq_core::repository::{AuditSink, ListingRepository, MerchantRepository};
use souq_core::{EngineError, EngineResult};
use souq_store::app_config::{EngagementPolicy, TrustPolicy};

use crate::trust::{TrustChangeReason, TrustScoreLedger};

/// Admin-side actions on listings and merchants. Hard-deleting a listing
/// penalizes the owning merchant as a side effect.
#[derive(Clone)]
pub struct AdminModeration {
    merchants: Arc<dyn MerchantRepository>,
    listings: Arc<dyn ListingRepository>,
    ledger: TrustScoreLedger,
    audit: Arc<dyn AuditSink>,
    trust: TrustPolicy,
    engagement: EngagementPolicy,
}

impl AdminModeration {
    pub fn new(
        merchants: Arc<dyn MerchantRepository>,
        listings: Arc<dyn ListingRepository>,
        ledger: TrustScoreLedger,
        audit: Arc<dyn AuditSink>,
        trust: TrustPolicy,
        engagement: EngagementPolicy,
    ) -> Self {
        Self {
            merchants,
            listings,
            ledger,
            audit,
            trust,
            engagement,
        }
    }

    /// Hard delete with the admin-delete trust penalty.
    pub async fn delete_listing(&self, listing_id: Uuid) -> EngineResult<Listing> {
        let listing = self
            .listings
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("listing {listing_id} not found")))?;

        self.ledger
            .apply(listing.merchant_id, TrustChangeReason::AdminDeletedListing)
            .await?;

        self.listings.delete_listing(listing_id).await?;
        self.audit
            .record("delete_listing", "listing", &listing_id.to_string())
            .await?;

        info!(listing = %listing_id, merchant = %listing.merchant_id, "listing deleted by admin");
        Ok(listing)
    }

    pub async fn block_merchant(&self, merchant_id: Uuid) -> EngineResult<()> {
        self.require_merchant(merchant_id).await?;
        self.merchants.set_account_active(merchant_id, false).await?;
        self.audit
            .record("block_merchant", "merchant", &merchant_id.to_string())
            .await?;
        warn!(merchant = %merchant_id, "merchant blocked by admin");
        Ok(())
    }

    pub async fn unblock_merchant(&self, merchant_id: Uuid) -> EngineResult<()> {
        self.require_merchant(merchant_id).await?;
        self.merchants.set_account_active(merchant_id, true).await?;
        self.audit
            .record("unblock_merchant", "merchant", &merchant_id.to_string())
            .await?;
        info!(merchant = %merchant_id, "merchant unblocked by admin");
        Ok(())
    }

    pub async fn verify_merchant(&self, merchant_id: Uuid) -> EngineResult<()> {
        if !self.merchants.set_verified(merchant_id, true).await? {
            return Err(EngineError::NotFound(format!("merchant {merchant_id} not found")));
        }
        self.audit
            .record("verify_merchant", "merchant", &merchant_id.to_string())
            .await?;
        Ok(())
    }

    /// Records a user report. Reaching the report threshold auto-hides the
    /// listing and applies the auto-hidden penalty, once: the conditional
    /// hide affects 0 or 1 rows, and only the transition pays the penalty.
    pub async fn report_listing(&self, listing_id: Uuid) -> EngineResult<i32> {
        let listing = self
            .listings
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("listing {listing_id} not found")))?;

        let count = self
            .listings
            .increment_report_count(listing_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("listing {listing_id} not found")))?;

        if count >= self.engagement.auto_hide_reports
            && self
                .listings
                .try_auto_hide(listing_id, self.engagement.auto_hide_reports)
                .await?
        {
            warn!(listing = %listing_id, reports = count, "listing auto-hidden after reports");
            self.audit
                .record("auto_hide_listing", "listing", &listing_id.to_string())
                .await?;
            self.ledger
                .apply(listing.merchant_id, TrustChangeReason::AutoHiddenListing)
                .await?;
        }

        Ok(count)
    }

    /// Listings needing admin attention: suspicious, heavily reported, or
    /// owned by a low-trust merchant.
    pub async fn flagged_listings(&self) -> EngineResult<Vec<RankedListing>> {
        Ok(self
            .listings
            .flagged_listings(self.engagement.auto_hide_reports, self.trust.flag_threshold)
            .await?)
    }

    async fn require_merchant(&self, merchant_id: Uuid) -> EngineResult<()> {
        self.merchants
            .get_merchant(merchant_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("merchant {merchant_id} not found")))?;
        Ok(())
    }
}

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use souq_core::models::Listing;
use souq_core::repository::{ListingRepository, MerchantRepository};
use souq_core::{EngineError, EngineResult};

use crate::detector;
use crate::gate::EligibilityGate;
use crate::trust::{TrustChangeReason, TrustScoreLedger};

/// Listings may not run longer than this from their creation time.
pub const MAX_EXPIRY_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct ListingDraft {
    pub title: String,
    pub description: Option<String>,
    pub original_price: f64,
    pub discounted_price: f64,
    pub image_url: Option<String>,
    pub expiry_date: DateTime<Utc>,
}

/// The gate-checked listing creation flow: validation, classification,
/// transactional persistence, and the suspicious-listing penalty.
#[derive(Clone)]
pub struct ListingPublisher {
    merchants: Arc<dyn MerchantRepository>,
    listings: Arc<dyn ListingRepository>,
    gate: EligibilityGate,
    ledger: TrustScoreLedger,
}

impl ListingPublisher {
    pub fn new(
        merchants: Arc<dyn MerchantRepository>,
        listings: Arc<dyn ListingRepository>,
        gate: EligibilityGate,
        ledger: TrustScoreLedger,
    ) -> Self {
        Self {
            merchants,
            listings,
            gate,
            ledger,
        }
    }

    pub async fn publish(&self, account_id: Uuid, draft: ListingDraft) -> EngineResult<Listing> {
        let merchant = self
            .merchants
            .merchant_for_account(account_id)
            .await?
            .ok_or_else(|| {
                EngineError::Forbidden(
                    "a merchant profile is required to publish listings".to_string(),
                )
            })?;

        let active = self
            .merchants
            .is_account_active(merchant.id)
            .await?
            .unwrap_or(false);
        if !active {
            return Err(EngineError::Forbidden(
                "cannot publish listings from an inactive account".to_string(),
            ));
        }

        let decision = self.gate.can_publish(merchant.id).await?;
        if !decision.allowed {
            return Err(EngineError::Forbidden(
                decision
                    .reason
                    .unwrap_or_else(|| "cannot publish listings".to_string()),
            ));
        }

        let now = Utc::now();
        if draft.expiry_date <= now {
            return Err(EngineError::Validation(
                "expiry date must be in the future".to_string(),
            ));
        }
        if draft.expiry_date > now + Duration::days(MAX_EXPIRY_DAYS) {
            return Err(EngineError::Validation(format!(
                "expiry date cannot exceed {MAX_EXPIRY_DAYS} days from today"
            )));
        }

        let classification = detector::classify(draft.original_price, draft.discounted_price)?;

        let listing = Listing {
            id: Uuid::new_v4(),
            merchant_id: merchant.id,
            title: draft.title,
            description: draft.description,
            original_price: draft.original_price,
            discounted_price: draft.discounted_price,
            discount_percentage: classification.discount_percentage,
            image_url: draft.image_url,
            is_active: true,
            is_suspicious: classification.is_suspicious,
            report_count: 0,
            expiry_date: draft.expiry_date,
            created_at: now,
        };

        self.listings.create_listing(&listing).await?;

        if classification.is_suspicious {
            info!(
                listing = %listing.id,
                merchant = %merchant.id,
                discount = classification.discount_percentage,
                "suspicious listing published, penalizing merchant"
            );
            self.ledger
                .apply(merchant.id, TrustChangeReason::SuspiciousListing)
                .await?;
        }

        Ok(listing)
    }
}

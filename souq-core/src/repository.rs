use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    FeaturedSelection, Listing, ListingEngagement, Merchant, PushEndpoint, RankedListing,
    SaveResult, TrustOutcome,
};

type RepoError = Box<dyn std::error::Error + Send + Sync>;

/// Eligibility filter for feed candidate reads.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    pub now: DateTime<Utc>,
    pub min_trust: i32,
    pub city_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
    pub min_discount: Option<f64>,
    pub max_discount: Option<f64>,
}

/// Criteria for the daily deal candidate read.
#[derive(Debug, Clone)]
pub struct DealWindow {
    pub now: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub min_discount: f64,
    pub max_reports: i32,
    pub min_trust: i32,
}

/// Repository trait for merchant and owning-account access.
#[async_trait]
pub trait MerchantRepository: Send + Sync {
    async fn get_merchant(&self, id: Uuid) -> Result<Option<Merchant>, RepoError>;

    async fn merchant_for_account(&self, account_id: Uuid) -> Result<Option<Merchant>, RepoError>;

    /// Atomically clamps `trust_score + delta` into [0, 100] and commits the
    /// score change, its audit entry, and (when the new score falls below
    /// `block_below` while the owning account is still active) the account
    /// deactivation plus its audit entry, all together. Returns None when the
    /// merchant does not exist. `blocked` is true only for the invocation
    /// that performed the active -> inactive transition.
    async fn adjust_trust(
        &self,
        merchant_id: Uuid,
        delta: i32,
        block_below: i32,
        reason: &str,
    ) -> Result<Option<TrustOutcome>, RepoError>;

    async fn is_account_active(&self, merchant_id: Uuid) -> Result<Option<bool>, RepoError>;

    /// Flips the owning account's active flag. Returns true when a row
    /// actually transitioned.
    async fn set_account_active(&self, merchant_id: Uuid, active: bool) -> Result<bool, RepoError>;

    async fn set_verified(&self, merchant_id: Uuid, verified: bool) -> Result<bool, RepoError>;
}

/// Repository trait for listing access.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Persists the listing together with its engagement row in a single
    /// transaction.
    async fn create_listing(&self, listing: &Listing) -> Result<(), RepoError>;

    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>, RepoError>;

    async fn delete_listing(&self, id: Uuid) -> Result<bool, RepoError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool, RepoError>;

    /// Returns the new report count, or None when the listing is absent.
    async fn increment_report_count(&self, id: Uuid) -> Result<Option<i32>, RepoError>;

    /// Conditionally hides a listing whose report count has reached
    /// `min_reports`. Affects 0 or 1 rows; true only on the transition.
    async fn try_auto_hide(&self, id: Uuid, min_reports: i32) -> Result<bool, RepoError>;

    /// Bulk-deactivates listings past expiry. Returns rows affected.
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, RepoError>;

    async fn feed_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<RankedListing>, RepoError>;

    async fn deal_candidates(&self, window: &DealWindow) -> Result<Vec<RankedListing>, RepoError>;

    /// Listings needing admin attention: suspicious, heavily reported, or
    /// owned by a merchant below `max_trust`.
    async fn flagged_listings(
        &self,
        min_reports: i32,
        max_trust: i32,
    ) -> Result<Vec<RankedListing>, RepoError>;
}

/// Repository trait for per-listing engagement counters.
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    /// Increments the view counter, creating the row if absent. Returns the
    /// new count.
    async fn increment_views(&self, listing_id: Uuid) -> Result<i64, RepoError>;

    /// Records the (account, listing) save and increments the save counter
    /// in one transaction. Duplicate saves by the same account are rejected
    /// without touching the counter.
    async fn record_save(&self, account_id: Uuid, listing_id: Uuid)
        -> Result<SaveResult, RepoError>;

    async fn increment_clicks(&self, listing_id: Uuid) -> Result<i64, RepoError>;

    /// Single conditional update: succeeds only when the view counter has
    /// reached `threshold` and the flag is still false. A true return is the
    /// one and only award signal for this listing.
    async fn try_award_view_bonus(&self, listing_id: Uuid, threshold: i64)
        -> Result<bool, RepoError>;

    async fn try_award_save_bonus(&self, listing_id: Uuid, threshold: i64)
        -> Result<bool, RepoError>;

    async fn get_engagement(&self, listing_id: Uuid)
        -> Result<Option<ListingEngagement>, RepoError>;
}

/// Repository trait for the daily featured-selection batch.
#[async_trait]
pub trait FeaturedSelectionRepository: Send + Sync {
    async fn exists_for_day(&self, day: NaiveDate) -> Result<bool, RepoError>;

    /// Deletes selections strictly older than `day`. Returns rows removed.
    async fn prune_before(&self, day: NaiveDate) -> Result<u64, RepoError>;

    /// Records the day's batch behind a storage-level uniqueness guarantee.
    /// Returns false when another process already owns the day; the caller
    /// treats that as the idempotent no-op, not an error.
    async fn record_selections(&self, day: NaiveDate, listing_ids: &[Uuid])
        -> Result<bool, RepoError>;

    async fn selections_for_day(&self, day: NaiveDate)
        -> Result<Vec<FeaturedSelection>, RepoError>;
}

/// Append-only audit sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<(), RepoError>;
}

/// Registered push endpoints, read by the notification fan-out.
#[async_trait]
pub trait PushEndpointRepository: Send + Sync {
    /// Endpoints belonging to active accounts, optionally restricted to a city.
    async fn active_endpoints(&self, city_id: Option<Uuid>)
        -> Result<Vec<PushEndpoint>, RepoError>;

    /// Removes endpoints the transport reported as invalid. Returns rows removed.
    async fn remove_endpoints(&self, ids: &[Uuid]) -> Result<u64, RepoError>;
}

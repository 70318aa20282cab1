use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owning account for a merchant. Blocking a merchant deactivates this
/// record; the merchant row itself is never touched by a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub phone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub city_id: Uuid,
    pub area_id: Uuid,
    /// Bounded reputation value, always within [0, 100].
    pub trust_score: i32,
    pub premium_until: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    /// Premium is derived, never stored: an unexpired entitlement wins.
    pub fn is_premium(&self, now: DateTime<Utc>) -> bool {
        self.premium_until.map(|until| until > now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub original_price: f64,
    pub discounted_price: f64,
    /// Derived once at creation, immutable thereafter.
    pub discount_percentage: f64,
    pub image_url: Option<String>,
    pub is_active: bool,
    /// Classified once at creation, never recomputed.
    pub is_suspicious: bool,
    pub report_count: i32,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date < now
    }
}

/// One-to-one engagement counters per listing. The bonus flags transition
/// false -> true at most once per listing, ever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingEngagement {
    pub listing_id: Uuid,
    pub views: i64,
    pub saves: i64,
    pub clicks: i64,
    pub view_bonus_awarded: bool,
    pub save_bonus_awarded: bool,
}

impl ListingEngagement {
    pub fn new(listing_id: Uuid) -> Self {
        Self {
            listing_id,
            views: 0,
            saves: 0,
            clicks: 0,
            view_bonus_awarded: false,
            save_bonus_awarded: false,
        }
    }
}

/// A daily "featured deal" pick. At most one successful batch exists per
/// calendar day system-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturedSelection {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub selection_day: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit record. Write-only from the engine's side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Merchant fields carried alongside a listing when ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantSummary {
    pub id: Uuid,
    pub name: String,
    pub trust_score: i32,
    pub premium_until: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub city_id: Uuid,
    pub area_id: Uuid,
}

impl MerchantSummary {
    pub fn is_premium(&self, now: DateTime<Utc>) -> bool {
        self.premium_until.map(|until| until > now).unwrap_or(false)
    }
}

/// A listing joined with its merchant snapshot, as read for ranking.
/// Repositories return these in no particular order; ordering is owned
/// by the engine so results never depend on storage iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedListing {
    pub listing: Listing,
    pub merchant: MerchantSummary,
}

/// Result of an atomic trust adjustment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrustOutcome {
    pub previous_score: i32,
    pub new_score: i32,
    /// True only on the run that actually deactivated the owning account.
    pub blocked: bool,
}

/// Result of recording a save event for an account/listing pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Recorded { saves: i64 },
    AlreadySaved,
}

/// A registered push endpoint (device token) for an active account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEndpoint {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

//! In-memory store implementing every repository contract behind a single
//! mutex, so the engine's exactly-once and clamping guarantees can be
//! exercised without a database.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use souq_core::models::{
    Account, AuditEntry, FeaturedSelection, Listing, ListingEngagement, Merchant,
    MerchantSummary, PushEndpoint, RankedListing, SaveResult, TrustOutcome,
};
use souq_core::notify::{DispatchReport, Notification, NotificationDispatcher};
use souq_core::repository::{
    AuditSink, CandidateFilter, DealWindow, EngagementRepository, FeaturedSelectionRepository,
    ListingRepository, MerchantRepository, PushEndpointRepository,
};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    merchants: HashMap<Uuid, Merchant>,
    listings: HashMap<Uuid, Listing>,
    engagement: HashMap<Uuid, ListingEngagement>,
    saved: HashSet<(Uuid, Uuid)>,
    featured_days: BTreeSet<NaiveDate>,
    featured: Vec<FeaturedSelection>,
    audit: Vec<AuditEntry>,
    endpoints: HashMap<Uuid, PushEndpoint>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_account(&self, active: bool) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            phone: format!("+962{}", &Uuid::new_v4().simple().to_string()[..9]),
            is_active: active,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .unwrap()
            .accounts
            .insert(account.id, account.clone());
        account
    }

    pub fn seed_merchant(
        &self,
        trust_score: i32,
        premium_until: Option<DateTime<Utc>>,
    ) -> Merchant {
        self.seed_merchant_in(trust_score, premium_until, Uuid::new_v4(), Uuid::new_v4())
    }

    pub fn seed_merchant_in(
        &self,
        trust_score: i32,
        premium_until: Option<DateTime<Utc>>,
        city_id: Uuid,
        area_id: Uuid,
    ) -> Merchant {
        let account = self.seed_account(true);
        let merchant = Merchant {
            id: Uuid::new_v4(),
            account_id: account.id,
            name: format!("merchant-{}", &account.id.simple().to_string()[..6]),
            city_id,
            area_id,
            trust_score,
            premium_until,
            is_verified: false,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .unwrap()
            .merchants
            .insert(merchant.id, merchant.clone());
        merchant
    }

    /// Seeds an active listing with the given discount percentage (prices
    /// derived from a 100.0 original) and expiry.
    pub fn seed_listing(
        &self,
        merchant_id: Uuid,
        discount_percentage: f64,
        expiry_date: DateTime<Utc>,
    ) -> Listing {
        let listing = Listing {
            id: Uuid::new_v4(),
            merchant_id,
            title: "seeded listing".to_string(),
            description: None,
            original_price: 100.0,
            discounted_price: 100.0 * (1.0 - discount_percentage / 100.0),
            discount_percentage,
            image_url: None,
            is_active: true,
            is_suspicious: false,
            report_count: 0,
            expiry_date,
            created_at: Utc::now(),
        };
        self.insert_listing(listing.clone());
        listing
    }

    pub fn insert_listing(&self, listing: Listing) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .engagement
            .insert(listing.id, ListingEngagement::new(listing.id));
        inner.listings.insert(listing.id, listing);
    }

    pub fn set_views(&self, listing_id: Uuid, views: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner.engagement.get_mut(&listing_id) {
            e.views = views;
        }
    }

    pub fn set_saves(&self, listing_id: Uuid, saves: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner.engagement.get_mut(&listing_id) {
            e.saves = saves;
        }
    }

    pub fn seed_endpoint(&self, account_id: Uuid, token: &str) -> PushEndpoint {
        let endpoint = PushEndpoint {
            id: Uuid::new_v4(),
            account_id,
            token: token.to_string(),
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .unwrap()
            .endpoints
            .insert(endpoint.id, endpoint.clone());
        endpoint
    }

    pub fn account_is_active(&self, account_id: Uuid) -> bool {
        self.inner
            .lock()
            .unwrap()
            .accounts
            .get(&account_id)
            .map(|a| a.is_active)
            .unwrap_or(false)
    }

    pub fn listing(&self, id: Uuid) -> Option<Listing> {
        self.inner.lock().unwrap().listings.get(&id).cloned()
    }

    pub fn merchant(&self, id: Uuid) -> Option<Merchant> {
        self.inner.lock().unwrap().merchants.get(&id).cloned()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().unwrap().audit.clone()
    }

    pub fn endpoint_count(&self) -> usize {
        self.inner.lock().unwrap().endpoints.len()
    }
}

fn summary(merchant: &Merchant) -> MerchantSummary {
    MerchantSummary {
        id: merchant.id,
        name: merchant.name.clone(),
        trust_score: merchant.trust_score,
        premium_until: merchant.premium_until,
        is_verified: merchant.is_verified,
        city_id: merchant.city_id,
        area_id: merchant.area_id,
    }
}

fn push_audit(inner: &mut Inner, action: &str, entity_type: &str, entity_id: &str) {
    inner.audit.push(AuditEntry {
        action: action.to_string(),
        entity_type: entity_type.to_string(),
        entity_id: entity_id.to_string(),
        timestamp: Utc::now(),
    });
}

#[async_trait]
impl MerchantRepository for MemoryStore {
    async fn get_merchant(
        &self,
        id: Uuid,
    ) -> Result<Option<Merchant>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.inner.lock().unwrap().merchants.get(&id).cloned())
    }

    async fn merchant_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Option<Merchant>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .merchants
            .values()
            .find(|m| m.account_id == account_id)
            .cloned())
    }

    async fn adjust_trust(
        &self,
        merchant_id: Uuid,
        delta: i32,
        block_below: i32,
        _reason: &str,
    ) -> Result<Option<TrustOutcome>, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();

        let Some(merchant) = inner.merchants.get_mut(&merchant_id) else {
            return Ok(None);
        };
        let account_id = merchant.account_id;
        let previous_score = merchant.trust_score;
        let new_score = (previous_score + delta).clamp(0, 100);
        merchant.trust_score = new_score;

        push_audit(&mut inner, "trust_score_change", "merchant", &merchant_id.to_string());

        let mut blocked = false;
        if new_score < block_below {
            if let Some(account) = inner.accounts.get_mut(&account_id) {
                if account.is_active {
                    account.is_active = false;
                    blocked = true;
                }
            }
            if blocked {
                push_audit(&mut inner, "auto_block_merchant", "merchant", &merchant_id.to_string());
            }
        }

        Ok(Some(TrustOutcome {
            previous_score,
            new_score,
            blocked,
        }))
    }

    async fn is_account_active(
        &self,
        merchant_id: Uuid,
    ) -> Result<Option<bool>, Box<dyn std::error::Error + Send + Sync>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .merchants
            .get(&merchant_id)
            .and_then(|m| inner.accounts.get(&m.account_id))
            .map(|a| a.is_active))
    }

    async fn set_account_active(
        &self,
        merchant_id: Uuid,
        active: bool,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(account_id) = inner.merchants.get(&merchant_id).map(|m| m.account_id) else {
            return Ok(false);
        };
        match inner.accounts.get_mut(&account_id) {
            Some(account) if account.is_active != active => {
                account.is_active = active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_verified(
        &self,
        merchant_id: Uuid,
        verified: bool,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.merchants.get_mut(&merchant_id) {
            Some(merchant) => {
                merchant.is_verified = verified;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ListingRepository for MemoryStore {
    async fn create_listing(
        &self,
        listing: &Listing,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.insert_listing(listing.clone());
        Ok(())
    }

    async fn get_listing(
        &self,
        id: Uuid,
    ) -> Result<Option<Listing>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.inner.lock().unwrap().listings.get(&id).cloned())
    }

    async fn delete_listing(
        &self,
        id: Uuid,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        inner.engagement.remove(&id);
        Ok(inner.listings.remove(&id).is_some())
    }

    async fn set_active(
        &self,
        id: Uuid,
        active: bool,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.listings.get_mut(&id) {
            Some(listing) => {
                listing.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_report_count(
        &self,
        id: Uuid,
    ) -> Result<Option<i32>, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.listings.get_mut(&id).map(|l| {
            l.report_count += 1;
            l.report_count
        }))
    }

    async fn try_auto_hide(
        &self,
        id: Uuid,
        min_reports: i32,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.listings.get_mut(&id) {
            Some(l) if l.is_active && l.report_count >= min_reports => {
                l.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        let mut affected = 0;
        for listing in inner.listings.values_mut() {
            if listing.is_active && listing.expiry_date < now {
                listing.is_active = false;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn feed_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<RankedListing>, Box<dyn std::error::Error + Send + Sync>> {
        let inner = self.inner.lock().unwrap();
        let mut out = Vec::new();
        for listing in inner.listings.values() {
            if !listing.is_active || listing.expiry_date < filter.now {
                continue;
            }
            let Some(merchant) = inner.merchants.get(&listing.merchant_id) else {
                continue;
            };
            if merchant.trust_score < filter.min_trust {
                continue;
            }
            if filter.city_id.is_some_and(|c| merchant.city_id != c) {
                continue;
            }
            if filter.area_id.is_some_and(|a| merchant.area_id != a) {
                continue;
            }
            if filter
                .min_discount
                .is_some_and(|d| listing.discount_percentage < d)
            {
                continue;
            }
            if filter
                .max_discount
                .is_some_and(|d| listing.discount_percentage > d)
            {
                continue;
            }
            out.push(RankedListing {
                listing: listing.clone(),
                merchant: summary(merchant),
            });
        }
        Ok(out)
    }

    async fn deal_candidates(
        &self,
        window: &DealWindow,
    ) -> Result<Vec<RankedListing>, Box<dyn std::error::Error + Send + Sync>> {
        let inner = self.inner.lock().unwrap();
        let mut out = Vec::new();
        for listing in inner.listings.values() {
            if !listing.is_active
                || listing.is_suspicious
                || listing.discount_percentage < window.min_discount
                || listing.report_count >= window.max_reports
                || listing.expiry_date < window.now
                || listing.expiry_date > window.until
            {
                continue;
            }
            let Some(merchant) = inner.merchants.get(&listing.merchant_id) else {
                continue;
            };
            if merchant.trust_score < window.min_trust {
                continue;
            }
            out.push(RankedListing {
                listing: listing.clone(),
                merchant: summary(merchant),
            });
        }
        Ok(out)
    }

    async fn flagged_listings(
        &self,
        min_reports: i32,
        max_trust: i32,
    ) -> Result<Vec<RankedListing>, Box<dyn std::error::Error + Send + Sync>> {
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<RankedListing> = inner
            .listings
            .values()
            .filter_map(|listing| {
                let merchant = inner.merchants.get(&listing.merchant_id)?;
                let flagged = listing.is_suspicious
                    || listing.report_count >= min_reports
                    || merchant.trust_score < max_trust;
                flagged.then(|| RankedListing {
                    listing: listing.clone(),
                    merchant: summary(merchant),
                })
            })
            .collect();
        out.sort_by(|a, b| {
            b.listing
                .report_count
                .cmp(&a.listing.report_count)
                .then_with(|| b.listing.created_at.cmp(&a.listing.created_at))
        });
        Ok(out)
    }
}

#[async_trait]
impl EngagementRepository for MemoryStore {
    async fn increment_views(
        &self,
        listing_id: Uuid,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .engagement
            .entry(listing_id)
            .or_insert_with(|| ListingEngagement::new(listing_id));
        entry.views += 1;
        Ok(entry.views)
    }

    async fn record_save(
        &self,
        account_id: Uuid,
        listing_id: Uuid,
    ) -> Result<SaveResult, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.saved.insert((account_id, listing_id)) {
            return Ok(SaveResult::AlreadySaved);
        }
        let entry = inner
            .engagement
            .entry(listing_id)
            .or_insert_with(|| ListingEngagement::new(listing_id));
        entry.saves += 1;
        Ok(SaveResult::Recorded { saves: entry.saves })
    }

    async fn increment_clicks(
        &self,
        listing_id: Uuid,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .engagement
            .entry(listing_id)
            .or_insert_with(|| ListingEngagement::new(listing_id));
        entry.clicks += 1;
        Ok(entry.clicks)
    }

    async fn try_award_view_bonus(
        &self,
        listing_id: Uuid,
        threshold: i64,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.engagement.get_mut(&listing_id) {
            Some(e) if !e.view_bonus_awarded && e.views >= threshold => {
                e.view_bonus_awarded = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn try_award_save_bonus(
        &self,
        listing_id: Uuid,
        threshold: i64,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.engagement.get_mut(&listing_id) {
            Some(e) if !e.save_bonus_awarded && e.saves >= threshold => {
                e.save_bonus_awarded = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_engagement(
        &self,
        listing_id: Uuid,
    ) -> Result<Option<ListingEngagement>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.inner.lock().unwrap().engagement.get(&listing_id).cloned())
    }
}

#[async_trait]
impl FeaturedSelectionRepository for MemoryStore {
    async fn exists_for_day(
        &self,
        day: NaiveDate,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.inner.lock().unwrap().featured_days.contains(&day))
    }

    async fn prune_before(
        &self,
        day: NaiveDate,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.featured.len();
        inner.featured.retain(|s| s.selection_day >= day);
        inner.featured_days.retain(|d| *d >= day);
        Ok((before - inner.featured.len()) as u64)
    }

    async fn record_selections(
        &self,
        day: NaiveDate,
        listing_ids: &[Uuid],
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.featured_days.insert(day) {
            return Ok(false);
        }
        for listing_id in listing_ids {
            inner.featured.push(FeaturedSelection {
                id: Uuid::new_v4(),
                listing_id: *listing_id,
                selection_day: day,
                created_at: Utc::now(),
            });
        }
        Ok(true)
    }

    async fn selections_for_day(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<FeaturedSelection>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .featured
            .iter()
            .filter(|s| s.selection_day == day)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        push_audit(&mut inner, action, entity_type, entity_id);
        Ok(())
    }
}

#[async_trait]
impl PushEndpointRepository for MemoryStore {
    async fn active_endpoints(
        &self,
        city_id: Option<Uuid>,
    ) -> Result<Vec<PushEndpoint>, Box<dyn std::error::Error + Send + Sync>> {
        // City targeting is resolved by the account's home city; the memory
        // store does not track it, so a city filter returns everything.
        let _ = city_id;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .endpoints
            .values()
            .filter(|e| {
                inner
                    .accounts
                    .get(&e.account_id)
                    .map(|a| a.is_active)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn remove_endpoints(
        &self,
        ids: &[Uuid],
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.endpoints.len();
        for id in ids {
            inner.endpoints.remove(id);
        }
        Ok((before - inner.endpoints.len()) as u64)
    }
}

/// Test dispatcher that records every payload and reports success.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send_to_all(
        &self,
        note: Notification,
    ) -> Result<DispatchReport, Box<dyn std::error::Error + Send + Sync>> {
        self.sent.lock().unwrap().push(note);
        Ok(DispatchReport {
            sent: 1,
            failed: 0,
            removed: 0,
        })
    }
}

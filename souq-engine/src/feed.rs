use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use souq_core::models::RankedListing;
use souq_core::repository::{CandidateFilter, ListingRepository};
use souq_core::{EngineError, EngineResult};
use souq_store::app_config::{FeedPolicy, TrustPolicy};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedFilter {
    pub city_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
    pub min_discount: Option<f64>,
    pub max_discount: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FeedPagination {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Merchant fields exposed on feed items. Premium is computed at query
/// time; the raw entitlement timestamp is never exposed.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantCard {
    pub id: Uuid,
    pub name: String,
    pub trust_score: i32,
    pub is_premium: bool,
    pub is_verified: bool,
    pub city_id: Uuid,
    pub area_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub original_price: f64,
    pub discounted_price: f64,
    pub discount_percentage: f64,
    pub image_url: Option<String>,
    pub is_suspicious: bool,
    pub report_count: i32,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub merchant: MerchantCard,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub data: Vec<FeedItem>,
    pub meta: FeedMeta,
}

/// Total order over feed candidates. Each key breaks ties in the next;
/// the listing id closes the chain so the result is reproducible no
/// matter what order the store returned the rows in.
pub(crate) fn feed_order(a: &RankedListing, b: &RankedListing, now: DateTime<Utc>) -> Ordering {
    b.merchant
        .is_premium(now)
        .cmp(&a.merchant.is_premium(now))
        .then_with(|| a.listing.is_suspicious.cmp(&b.listing.is_suspicious))
        .then_with(|| a.listing.report_count.cmp(&b.listing.report_count))
        .then_with(|| b.merchant.trust_score.cmp(&a.merchant.trust_score))
        .then_with(|| {
            b.listing
                .discount_percentage
                .partial_cmp(&a.listing.discount_percentage)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.listing.expiry_date.cmp(&b.listing.expiry_date))
        .then_with(|| a.listing.id.cmp(&b.listing.id))
}

/// Deterministic multi-key ordering and pagination of eligible listings.
/// Pure read path; safe under unbounded concurrency.
#[derive(Clone)]
pub struct FeedRankingEngine {
    listings: Arc<dyn ListingRepository>,
    trust: TrustPolicy,
    feed: FeedPolicy,
}

impl FeedRankingEngine {
    pub fn new(listings: Arc<dyn ListingRepository>, trust: TrustPolicy, feed: FeedPolicy) -> Self {
        Self {
            listings,
            trust,
            feed,
        }
    }

    pub async fn query(
        &self,
        filter: FeedFilter,
        pagination: FeedPagination,
    ) -> EngineResult<FeedResponse> {
        validate_discount_range(&filter)?;
        let (page, limit) = self.validate_pagination(pagination)?;

        let now = Utc::now();
        let mut candidates = self
            .listings
            .feed_candidates(&CandidateFilter {
                now,
                min_trust: self.trust.feed_threshold,
                city_id: filter.city_id,
                area_id: filter.area_id,
                min_discount: filter.min_discount,
                max_discount: filter.max_discount,
            })
            .await?;

        candidates.sort_by(|a, b| feed_order(a, b, now));

        let total = candidates.len() as u64;
        let total_pages = (total as u32).div_ceil(limit);
        // Widened before multiplying: limit is bounded but page is not.
        let skip = (page as usize - 1) * limit as usize;

        let data = candidates
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .map(|c| to_feed_item(c, now))
            .collect();

        Ok(FeedResponse {
            data,
            meta: FeedMeta {
                total,
                page,
                limit,
                total_pages,
                has_next_page: page < total_pages,
                has_previous_page: page > 1,
            },
        })
    }

    fn validate_pagination(&self, pagination: FeedPagination) -> EngineResult<(u32, u32)> {
        let page = pagination.page.unwrap_or(1);
        if page < 1 {
            return Err(EngineError::Validation("page must be at least 1".to_string()));
        }

        let limit = pagination.limit.unwrap_or(self.feed.default_limit);
        if limit < 1 || limit > self.feed.max_limit {
            return Err(EngineError::Validation(format!(
                "limit must be between 1 and {}",
                self.feed.max_limit
            )));
        }

        Ok((page, limit))
    }
}

fn validate_discount_range(filter: &FeedFilter) -> EngineResult<()> {
    for bound in [filter.min_discount, filter.max_discount].into_iter().flatten() {
        if !(0.0..=100.0).contains(&bound) {
            return Err(EngineError::Validation(
                "discount filters must be between 0 and 100".to_string(),
            ));
        }
    }
    if let (Some(min), Some(max)) = (filter.min_discount, filter.max_discount) {
        if min > max {
            return Err(EngineError::Validation(
                "minDiscount cannot exceed maxDiscount".to_string(),
            ));
        }
    }
    Ok(())
}

fn to_feed_item(candidate: RankedListing, now: DateTime<Utc>) -> FeedItem {
    let RankedListing { listing, merchant } = candidate;
    let is_premium = merchant.is_premium(now);
    FeedItem {
        id: listing.id,
        title: listing.title,
        description: listing.description,
        original_price: listing.original_price,
        discounted_price: listing.discounted_price,
        discount_percentage: listing.discount_percentage,
        image_url: listing.image_url,
        is_suspicious: listing.is_suspicious,
        report_count: listing.report_count,
        expiry_date: listing.expiry_date,
        created_at: listing.created_at,
        merchant: MerchantCard {
            id: merchant.id,
            name: merchant.name,
            trust_score: merchant.trust_score,
            is_premium,
            is_verified: merchant.is_verified,
            city_id: merchant.city_id,
            area_id: merchant.area_id,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use souq_core::models::{Listing, MerchantSummary};

    fn candidate(
        premium: bool,
        suspicious: bool,
        reports: i32,
        trust: i32,
        discount: f64,
        expiry_hours: i64,
        now: DateTime<Utc>,
    ) -> RankedListing {
        RankedListing {
            listing: Listing {
                id: Uuid::new_v4(),
                merchant_id: Uuid::new_v4(),
                title: "t".to_string(),
                description: None,
                original_price: 100.0,
                discounted_price: 100.0 - discount,
                discount_percentage: discount,
                image_url: None,
                is_active: true,
                is_suspicious: suspicious,
                report_count: reports,
                expiry_date: now + Duration::hours(expiry_hours),
                created_at: now,
            },
            merchant: MerchantSummary {
                id: Uuid::new_v4(),
                name: "m".to_string(),
                trust_score: trust,
                premium_until: premium.then(|| now + Duration::days(30)),
                is_verified: true,
                city_id: Uuid::new_v4(),
                area_id: Uuid::new_v4(),
            },
        }
    }

    #[test]
    fn trust_tiebreak_dominates_discount() {
        let now = Utc::now();
        // A: premium, clean, 0 reports, trust 80, 50% off.
        // B: same tier, trust 90, 40% off. B must rank first.
        let a = candidate(true, false, 0, 80, 50.0, 24, now);
        let b = candidate(true, false, 0, 90, 40.0, 24, now);
        assert_eq!(feed_order(&b, &a, now), Ordering::Less);
        assert_eq!(feed_order(&a, &b, now), Ordering::Greater);
    }

    #[test]
    fn premium_outranks_everything_else() {
        let now = Utc::now();
        let premium_weak = candidate(true, false, 5, 31, 10.0, 48, now);
        let regular_strong = candidate(false, false, 0, 100, 90.0, 1, now);
        assert_eq!(feed_order(&premium_weak, &regular_strong, now), Ordering::Less);
    }

    #[test]
    fn suspicious_sinks_below_clean() {
        let now = Utc::now();
        let clean = candidate(false, false, 2, 40, 20.0, 24, now);
        let suspicious = candidate(false, true, 0, 95, 85.0, 24, now);
        assert_eq!(feed_order(&clean, &suspicious, now), Ordering::Less);
    }

    #[test]
    fn earlier_expiry_wins_the_last_tiebreak() {
        let now = Utc::now();
        let soon = candidate(false, false, 0, 50, 30.0, 2, now);
        let later = candidate(false, false, 0, 50, 30.0, 40, now);
        assert_eq!(feed_order(&soon, &later, now), Ordering::Less);
    }

    #[test]
    fn ordering_is_total_and_deterministic() {
        let now = Utc::now();
        let mut set: Vec<RankedListing> = (0..8)
            .map(|i| candidate(i % 2 == 0, false, i % 3, 50 + i, 25.0, 24, now))
            .collect();

        let mut sorted_once = set.clone();
        sorted_once.sort_by(|a, b| feed_order(a, b, now));
        set.reverse();
        set.sort_by(|a, b| feed_order(a, b, now));

        let ids_a: Vec<Uuid> = sorted_once.iter().map(|c| c.listing.id).collect();
        let ids_b: Vec<Uuid> = set.iter().map(|c| c.listing.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn discount_range_validation() {
        let bad = FeedFilter {
            min_discount: Some(120.0),
            ..Default::default()
        };
        assert!(validate_discount_range(&bad).is_err());

        let inverted = FeedFilter {
            min_discount: Some(60.0),
            max_discount: Some(30.0),
            ..Default::default()
        };
        assert!(validate_discount_range(&inverted).is_err());

        let ok = FeedFilter {
            min_discount: Some(10.0),
            max_discount: Some(90.0),
            ..Default::default()
        };
        assert!(validate_discount_range(&ok).is_ok());
    }
}

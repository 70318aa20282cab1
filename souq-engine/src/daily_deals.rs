use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use souq_core::models::{FeaturedSelection, RankedListing};
use souq_core::notify::{Notification, NotificationDispatcher};
use souq_core::repository::{AuditSink, DealWindow, FeaturedSelectionRepository, ListingRepository};
use souq_core::EngineResult;
use souq_store::app_config::DealPolicy;

pub const DEAL_NOTIFICATION_TITLE: &str = "🔥 Today's Hot Deals!";
pub const DEAL_NOTIFICATION_BODY: &str = "5 limited-time offers are live. Check them now!";

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub selected_count: usize,
    pub selections: Vec<RankedListing>,
}

impl SelectionOutcome {
    fn empty() -> Self {
        Self {
            selected_count: 0,
            selections: Vec::new(),
        }
    }
}

fn deal_order(a: &RankedListing, b: &RankedListing) -> Ordering {
    b.listing
        .discount_percentage
        .partial_cmp(&a.listing.discount_percentage)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.merchant.trust_score.cmp(&a.merchant.trust_score))
        .then_with(|| a.listing.expiry_date.cmp(&b.listing.expiry_date))
        .then_with(|| a.listing.id.cmp(&b.listing.id))
}

/// Idempotent per-calendar-day batch selecting the featured deal set.
/// Mutual exclusion across process instances comes from the store's
/// uniqueness guarantee on the selection day, not in-process locking.
#[derive(Clone)]
pub struct DailyDealSelector {
    listings: Arc<dyn ListingRepository>,
    featured: Arc<dyn FeaturedSelectionRepository>,
    audit: Arc<dyn AuditSink>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    policy: DealPolicy,
}

impl DailyDealSelector {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        featured: Arc<dyn FeaturedSelectionRepository>,
        audit: Arc<dyn AuditSink>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        policy: DealPolicy,
    ) -> Self {
        Self {
            listings,
            featured,
            audit,
            dispatcher,
            policy,
        }
    }

    pub async fn run(&self, as_of: DateTime<Utc>) -> EngineResult<SelectionOutcome> {
        let day = as_of.date_naive();

        if self.featured.exists_for_day(day).await? {
            info!(%day, "daily deals already selected, skipping");
            return Ok(SelectionOutcome::empty());
        }

        // Single-day retention: everything older than yesterday goes.
        if let Some(yesterday) = day.pred_opt() {
            let pruned = self.featured.prune_before(yesterday).await?;
            if pruned > 0 {
                info!(pruned, "removed stale featured selections");
            }
        }

        let mut candidates = self
            .listings
            .deal_candidates(&DealWindow {
                now: as_of,
                until: as_of + Duration::days(self.policy.window_days),
                min_discount: self.policy.min_discount,
                max_reports: self.policy.max_reports,
                min_trust: self.policy.min_trust,
            })
            .await?;

        candidates.sort_by(deal_order);
        candidates.truncate(self.policy.selection_size);

        if candidates.is_empty() {
            warn!(%day, "no listings matched the daily deal criteria");
            return Ok(SelectionOutcome::empty());
        }

        let listing_ids: Vec<Uuid> = candidates.iter().map(|c| c.listing.id).collect();

        if !self.featured.record_selections(day, &listing_ids).await? {
            // Another instance won the day between our check and the insert.
            info!(%day, "daily deals recorded by a concurrent run, skipping");
            return Ok(SelectionOutcome::empty());
        }

        self.audit
            .record("daily_deals_selected", "featured_selection", "bulk")
            .await?;

        info!(%day, count = candidates.len(), "daily deals selected");

        // Fan-out is informational only: failures are logged, never retried.
        let note = Notification::broadcast(
            DEAL_NOTIFICATION_TITLE,
            DEAL_NOTIFICATION_BODY,
            json!({ "type": "daily_deals", "action": "view_deals" }),
        );
        match self.dispatcher.send_to_all(note).await {
            Ok(report) => info!(
                sent = report.sent,
                failed = report.failed,
                removed = report.removed,
                "daily deal notification dispatched"
            ),
            Err(e) => error!("daily deal notification dispatch failed: {e}"),
        }

        Ok(SelectionOutcome {
            selected_count: candidates.len(),
            selections: candidates,
        })
    }

    /// The persisted selection set for the given day.
    pub async fn deals_for_day(&self, as_of: DateTime<Utc>) -> EngineResult<Vec<FeaturedSelection>> {
        Ok(self.featured.selections_for_day(as_of.date_naive()).await?)
    }
}

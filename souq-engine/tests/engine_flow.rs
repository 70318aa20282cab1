//! End-to-end engine behavior over the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use souq_core::repository::EngagementRepository;
use souq_core::EngineError;
use souq_engine::{
    AdminModeration, DailyDealSelector, EligibilityGate, EngagementBonusTracker, ExpirySweeper,
    FeedFilter, FeedPagination, FeedRankingEngine, ListingDraft, ListingPublisher,
    TrustScoreLedger,
};
use souq_store::app_config::{DealPolicy, EngagementPolicy, FeedPolicy, TrustPolicy};
use souq_store::memory::RecordingDispatcher;
use souq_store::MemoryStore;

struct Harness {
    store: Arc<MemoryStore>,
    dispatcher: Arc<RecordingDispatcher>,
    ledger: TrustScoreLedger,
    gate: EligibilityGate,
    publisher: ListingPublisher,
    tracker: EngagementBonusTracker,
    feed: FeedRankingEngine,
    selector: DailyDealSelector,
    sweeper: ExpirySweeper,
    moderation: AdminModeration,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::default());

    let trust = TrustPolicy::default();
    let engagement = EngagementPolicy::default();

    let ledger = TrustScoreLedger::new(store.clone(), trust.clone());
    let gate = EligibilityGate::new(store.clone(), trust.clone());
    let publisher = ListingPublisher::new(
        store.clone(),
        store.clone(),
        gate.clone(),
        ledger.clone(),
    );
    let tracker = EngagementBonusTracker::new(
        store.clone(),
        store.clone(),
        ledger.clone(),
        engagement.clone(),
    );
    let feed = FeedRankingEngine::new(store.clone(), trust.clone(), FeedPolicy::default());
    let selector = DailyDealSelector::new(
        store.clone(),
        store.clone(),
        store.clone(),
        dispatcher.clone(),
        DealPolicy::default(),
    );
    let sweeper = ExpirySweeper::new(store.clone());
    let moderation = AdminModeration::new(
        store.clone(),
        store.clone(),
        ledger.clone(),
        store.clone(),
        trust,
        engagement,
    );

    Harness {
        store,
        dispatcher,
        ledger,
        gate,
        publisher,
        tracker,
        feed,
        selector,
        sweeper,
        moderation,
    }
}

fn draft(original: f64, discounted: f64) -> ListingDraft {
    ListingDraft {
        title: "fresh falafel platter".to_string(),
        description: None,
        original_price: original,
        discounted_price: discounted,
        image_url: None,
        expiry_date: Utc::now() + Duration::days(7),
    }
}

#[tokio::test]
async fn trust_score_stays_within_bounds() {
    let h = harness();
    let merchant = h.store.seed_merchant(50, None);

    let up = h.ledger.adjust(merchant.id, 1000, "manual_test").await.unwrap();
    assert_eq!(up.new_score, 100);

    let down = h.ledger.adjust(merchant.id, -1000, "manual_test").await.unwrap();
    assert_eq!(down.new_score, 0);
}

#[tokio::test]
async fn adjusting_missing_merchant_is_not_found() {
    let h = harness();
    let err = h.ledger.adjust(Uuid::new_v4(), -2, "manual_test").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn auto_block_fires_exactly_once() {
    let h = harness();
    let merchant = h.store.seed_merchant(16, None);

    let first = h.ledger.adjust(merchant.id, -2, "manual_test").await.unwrap();
    assert_eq!(first.new_score, 14);
    assert!(first.blocked);
    assert!(!h.store.account_is_active(merchant.account_id));

    // Already inactive: further drops never re-trigger the block.
    let second = h.ledger.adjust(merchant.id, -2, "manual_test").await.unwrap();
    assert_eq!(second.new_score, 12);
    assert!(!second.blocked);

    let blocks = h
        .store
        .audit_entries()
        .into_iter()
        .filter(|e| e.action == "auto_block_merchant")
        .count();
    assert_eq!(blocks, 1);
}

#[tokio::test]
async fn gate_rejects_below_threshold_and_allows_at_it() {
    let h = harness();
    let low = h.store.seed_merchant(24, None);
    let ok = h.store.seed_merchant(25, None);

    let rejected = h.gate.can_publish(low.id).await.unwrap();
    assert!(!rejected.allowed);
    let reason = rejected.reason.unwrap();
    assert!(reason.contains("24/25"), "reason should cite score and threshold: {reason}");

    let allowed = h.gate.can_publish(ok.id).await.unwrap();
    assert!(allowed.allowed);
    assert!(allowed.reason.is_none());
}

#[tokio::test]
async fn publishing_suspicious_listing_penalizes_merchant() {
    let h = harness();
    let merchant = h.store.seed_merchant(50, None);

    // 85% off: flagged at creation, merchant pays -2.
    let listing = h
        .publisher
        .publish(merchant.account_id, draft(100.0, 15.0))
        .await
        .unwrap();
    assert!(listing.is_suspicious);
    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 48);

    // Exactly 80% off is clean.
    let listing = h
        .publisher
        .publish(merchant.account_id, draft(100.0, 20.0))
        .await
        .unwrap();
    assert!(!listing.is_suspicious);
    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 48);
}

#[tokio::test]
async fn publisher_enforces_gate_and_account_state() {
    let h = harness();

    let gated = h.store.seed_merchant(20, None);
    let err = h
        .publisher
        .publish(gated.account_id, draft(100.0, 50.0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let blocked = h.store.seed_merchant(60, None);
    h.moderation.block_merchant(blocked.id).await.unwrap();
    let err = h
        .publisher
        .publish(blocked.account_id, draft(100.0, 50.0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = h
        .publisher
        .publish(Uuid::new_v4(), draft(100.0, 50.0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn view_bonus_awarded_exactly_once_across_threshold() {
    let h = harness();
    let merchant = h.store.seed_merchant(50, None);
    let listing = h
        .store
        .seed_listing(merchant.id, 40.0, Utc::now() + Duration::days(5));

    h.store.set_views(listing.id, 99);

    // Two crossings of the threshold, as under a racing pair of views.
    let views = h.tracker.record_view(listing.id).await.unwrap();
    assert_eq!(views, 100);
    let views = h.tracker.record_view(listing.id).await.unwrap();
    assert_eq!(views, 101);

    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 51);

    let engagement = h.store.get_engagement(listing.id).await.unwrap().unwrap();
    assert!(engagement.view_bonus_awarded);
}

#[tokio::test]
async fn save_bonus_and_duplicate_save_rejection() {
    let h = harness();
    let merchant = h.store.seed_merchant(50, None);
    let listing = h
        .store
        .seed_listing(merchant.id, 40.0, Utc::now() + Duration::days(5));

    h.store.set_saves(listing.id, 19);

    let saver = h.store.seed_account(true);
    let saves = h.tracker.record_save(listing.id, saver.id).await.unwrap();
    assert_eq!(saves, 20);
    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 52);

    let err = h.tracker.record_save(listing.id, saver.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // A different account saving again never re-awards the bonus.
    let other = h.store.seed_account(true);
    h.tracker.record_save(listing.id, other.id).await.unwrap();
    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 52);
}

#[tokio::test]
async fn feed_trust_tiebreak_dominates_discount() {
    let h = harness();
    let now = Utc::now();
    let premium = Some(now + Duration::days(30));

    let a = h.store.seed_merchant(80, premium);
    h.store.seed_listing(a.id, 50.0, now + Duration::days(5));
    let b = h.store.seed_merchant(90, premium);
    h.store.seed_listing(b.id, 40.0, now + Duration::days(5));

    let response = h
        .feed
        .query(FeedFilter::default(), FeedPagination::default())
        .await
        .unwrap();

    assert_eq!(response.data.len(), 2);
    assert_eq!(response.data[0].merchant.id, b.id);
    assert!(response.data[0].merchant.is_premium);
}

#[tokio::test]
async fn feed_excludes_low_trust_and_expired_listings() {
    let h = harness();
    let now = Utc::now();

    let visible = h.store.seed_merchant(35, None);
    h.store.seed_listing(visible.id, 20.0, now + Duration::days(2));

    let low_trust = h.store.seed_merchant(29, None);
    h.store.seed_listing(low_trust.id, 60.0, now + Duration::days(2));

    let expired_owner = h.store.seed_merchant(80, None);
    let expired = h
        .store
        .seed_listing(expired_owner.id, 60.0, now - Duration::hours(1));

    let response = h
        .feed
        .query(FeedFilter::default(), FeedPagination::default())
        .await
        .unwrap();

    let ids: Vec<Uuid> = response.data.iter().map(|d| d.id).collect();
    assert_eq!(response.meta.total, 1);
    assert!(!ids.contains(&expired.id));
    assert_eq!(response.data[0].merchant.id, visible.id);
}

#[tokio::test]
async fn feed_pagination_meta_is_consistent() {
    let h = harness();
    let now = Utc::now();
    let merchant = h.store.seed_merchant(60, None);
    for _ in 0..5 {
        h.store.seed_listing(merchant.id, 25.0, now + Duration::days(3));
    }

    let page1 = h
        .feed
        .query(
            FeedFilter::default(),
            FeedPagination {
                page: Some(1),
                limit: Some(2),
            },
        )
        .await
        .unwrap();
    assert_eq!(page1.data.len(), 2);
    assert_eq!(page1.meta.total, 5);
    assert_eq!(page1.meta.total_pages, 3);
    assert!(page1.meta.has_next_page);
    assert!(!page1.meta.has_previous_page);

    let page3 = h
        .feed
        .query(
            FeedFilter::default(),
            FeedPagination {
                page: Some(3),
                limit: Some(2),
            },
        )
        .await
        .unwrap();
    assert_eq!(page3.data.len(), 1);
    assert!(!page3.meta.has_next_page);
    assert!(page3.meta.has_previous_page);

    let err = h
        .feed
        .query(
            FeedFilter::default(),
            FeedPagination {
                page: Some(1),
                limit: Some(500),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn huge_page_number_returns_an_empty_page() {
    let h = harness();
    let merchant = h.store.seed_merchant(60, None);
    h.store
        .seed_listing(merchant.id, 25.0, Utc::now() + Duration::days(3));

    // Page is unbounded; far past the end must be an empty page, not a panic.
    let response = h
        .feed
        .query(
            FeedFilter::default(),
            FeedPagination {
                page: Some(u32::MAX),
                limit: Some(100),
            },
        )
        .await
        .unwrap();

    assert!(response.data.is_empty());
    assert_eq!(response.meta.total, 1);
    assert_eq!(response.meta.page, u32::MAX);
    assert!(!response.meta.has_next_page);
    assert!(response.meta.has_previous_page);
}

#[tokio::test]
async fn daily_selection_is_idempotent_per_day() {
    let h = harness();
    let now = Utc::now();

    for i in 0..6 {
        let merchant = h.store.seed_merchant(55 + i, None);
        h.store
            .seed_listing(merchant.id, 35.0 + i as f64, now + Duration::days(1));
    }

    let first = h.selector.run(now).await.unwrap();
    assert_eq!(first.selected_count, 5);
    assert_eq!(h.dispatcher.sent.lock().unwrap().len(), 1);

    let before = h.selector.deals_for_day(now).await.unwrap();

    let second = h.selector.run(now).await.unwrap();
    assert_eq!(second.selected_count, 0);
    assert!(second.selections.is_empty());

    let after = h.selector.deals_for_day(now).await.unwrap();
    assert_eq!(before.len(), after.len());
    // No second notification either.
    assert_eq!(h.dispatcher.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn daily_selection_orders_by_discount_then_trust() {
    let h = harness();
    let now = Utc::now();

    let modest = h.store.seed_merchant(95, None);
    h.store.seed_listing(modest.id, 40.0, now + Duration::days(1));
    let steep = h.store.seed_merchant(55, None);
    let steep_listing = h.store.seed_listing(steep.id, 70.0, now + Duration::days(1));

    let outcome = h.selector.run(now).await.unwrap();
    assert_eq!(outcome.selected_count, 2);
    assert_eq!(outcome.selections[0].listing.id, steep_listing.id);
}

#[tokio::test]
async fn daily_selection_with_no_candidates_is_not_an_error() {
    let h = harness();
    let now = Utc::now();

    // Below the deal trust floor: never a candidate.
    let merchant = h.store.seed_merchant(45, None);
    h.store.seed_listing(merchant.id, 60.0, now + Duration::days(1));
    // Expiry outside the 3-day window.
    let other = h.store.seed_merchant(80, None);
    h.store.seed_listing(other.id, 60.0, now + Duration::days(10));

    let outcome = h.selector.run(now).await.unwrap();
    assert_eq!(outcome.selected_count, 0);
    assert!(h.dispatcher.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn expiry_sweep_is_idempotent() {
    let h = harness();
    let merchant = h.store.seed_merchant(50, None);
    let stale = h
        .store
        .seed_listing(merchant.id, 30.0, Utc::now() - Duration::hours(2));
    h.store
        .seed_listing(merchant.id, 30.0, Utc::now() + Duration::days(2));

    assert_eq!(h.sweeper.sweep().await, 1);
    assert!(!h.store.listing(stale.id).unwrap().is_active);

    // Nothing newly expired: zero rows affected.
    assert_eq!(h.sweeper.sweep().await, 0);
}

#[tokio::test]
async fn clicks_count_without_any_bonus() {
    let h = harness();
    let merchant = h.store.seed_merchant(50, None);
    let listing = h
        .store
        .seed_listing(merchant.id, 40.0, Utc::now() + Duration::days(5));

    assert_eq!(h.tracker.record_click(listing.id).await.unwrap(), 1);
    assert_eq!(h.tracker.record_click(listing.id).await.unwrap(), 2);
    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 50);

    let err = h.tracker.record_click(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn unblock_restores_a_blocked_account() {
    let h = harness();
    let merchant = h.store.seed_merchant(60, None);

    h.moderation.block_merchant(merchant.id).await.unwrap();
    assert!(!h.store.account_is_active(merchant.account_id));

    h.moderation.unblock_merchant(merchant.id).await.unwrap();
    assert!(h.store.account_is_active(merchant.account_id));

    let err = h.moderation.unblock_merchant(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn verify_merchant_sets_the_flag() {
    let h = harness();
    let merchant = h.store.seed_merchant(60, None);
    assert!(!merchant.is_verified);

    h.moderation.verify_merchant(merchant.id).await.unwrap();
    assert!(h.store.merchant(merchant.id).unwrap().is_verified);

    let err = h.moderation.verify_merchant(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn flagged_listings_cover_all_three_triggers() {
    let h = harness();
    let now = Utc::now();

    // Suspicious at creation (90% off, published through the normal flow).
    let suspicious_owner = h.store.seed_merchant(60, None);
    let suspicious = h
        .publisher
        .publish(suspicious_owner.account_id, draft(100.0, 10.0))
        .await
        .unwrap();
    assert!(suspicious.is_suspicious);

    // Reported to the auto-hide threshold.
    let reported_owner = h.store.seed_merchant(50, None);
    let reported = h
        .store
        .seed_listing(reported_owner.id, 20.0, now + Duration::days(2));
    for _ in 0..3 {
        h.moderation.report_listing(reported.id).await.unwrap();
    }

    // Clean listing from a merchant under the flag trust floor.
    let low_trust_owner = h.store.seed_merchant(35, None);
    let low_trust = h
        .store
        .seed_listing(low_trust_owner.id, 20.0, now + Duration::days(2));

    // Clean listing from a healthy merchant stays out of the queue.
    let healthy_owner = h.store.seed_merchant(80, None);
    let healthy = h
        .store
        .seed_listing(healthy_owner.id, 20.0, now + Duration::days(2));

    let flagged = h.moderation.flagged_listings().await.unwrap();
    let ids: Vec<Uuid> = flagged.iter().map(|f| f.listing.id).collect();

    assert!(ids.contains(&suspicious.id));
    assert!(ids.contains(&reported.id));
    assert!(ids.contains(&low_trust.id));
    assert!(!ids.contains(&healthy.id));
}

#[tokio::test]
async fn admin_delete_penalizes_merchant() {
    let h = harness();
    let merchant = h.store.seed_merchant(50, None);
    let listing = h
        .store
        .seed_listing(merchant.id, 30.0, Utc::now() + Duration::days(2));

    h.moderation.delete_listing(listing.id).await.unwrap();

    assert!(h.store.listing(listing.id).is_none());
    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 40);

    let err = h.moderation.delete_listing(listing.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn reports_auto_hide_once_at_threshold() {
    let h = harness();
    let merchant = h.store.seed_merchant(50, None);
    let listing = h
        .store
        .seed_listing(merchant.id, 30.0, Utc::now() + Duration::days(2));

    h.moderation.report_listing(listing.id).await.unwrap();
    h.moderation.report_listing(listing.id).await.unwrap();
    assert!(h.store.listing(listing.id).unwrap().is_active);
    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 50);

    let count = h.moderation.report_listing(listing.id).await.unwrap();
    assert_eq!(count, 3);
    assert!(!h.store.listing(listing.id).unwrap().is_active);
    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 45);

    // A fourth report does not re-hide or re-penalize.
    h.moderation.report_listing(listing.id).await.unwrap();
    assert_eq!(h.store.merchant(merchant.id).unwrap().trust_score, 45);
}

pub mod daily_deals;
pub mod detector;
pub mod engagement;
pub mod expiry;
pub mod feed;
pub mod gate;
pub mod moderation;
pub mod publish;
pub mod trust;

pub use daily_deals::{DailyDealSelector, SelectionOutcome};
pub use detector::{classify, Classification};
pub use engagement::EngagementBonusTracker;
pub use expiry::ExpirySweeper;
pub use feed::{FeedFilter, FeedPagination, FeedRankingEngine, FeedResponse};
pub use gate::{EligibilityGate, PublishDecision};
pub use moderation::AdminModeration;
pub use publish::{ListingDraft, ListingPublisher};
pub use trust::{TrustChangeReason, TrustScoreLedger};

pub mod app_config;
pub mod audit_log;
pub mod database;
pub mod engagement_repo;
pub mod featured_repo;
pub mod listing_repo;
pub mod memory;
pub mod merchant_repo;

pub use audit_log::PostgresAuditSink;
pub use database::DbClient;
pub use engagement_repo::PostgresEngagementRepository;
pub use featured_repo::{PostgresFeaturedRepository, PostgresPushEndpointRepository};
pub use listing_repo::PostgresListingRepository;
pub use memory::MemoryStore;
pub use merchant_repo::PostgresMerchantRepository;

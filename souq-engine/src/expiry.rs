use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use souq_core::repository::ListingRepository;

/// Periodic sweep deactivating listings past expiry. Failures are logged
/// and swallowed; the next tick retries independently.
#[derive(Clone)]
pub struct ExpirySweeper {
    listings: Arc<dyn ListingRepository>,
}

impl ExpirySweeper {
    pub fn new(listings: Arc<dyn ListingRepository>) -> Self {
        Self { listings }
    }

    /// Returns the number of listings deactivated. Re-running when nothing
    /// new has expired affects zero rows.
    pub async fn sweep(&self) -> u64 {
        match self.listings.deactivate_expired(Utc::now()).await {
            Ok(0) => {
                debug!("no expired listings found");
                0
            }
            Ok(count) => {
                info!("deactivated {count} expired listing(s)");
                count
            }
            Err(e) => {
                error!("failed to deactivate expired listings: {e}");
                0
            }
        }
    }
}

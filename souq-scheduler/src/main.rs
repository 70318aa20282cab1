use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime, Utc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use souq_core::repository::{
    AuditSink, FeaturedSelectionRepository, ListingRepository, PushEndpointRepository,
};
use souq_engine::{DailyDealSelector, ExpirySweeper};
use souq_notify::{BatchingDispatcher, NoopTransport};
use souq_store::{
    DbClient, PostgresAuditSink, PostgresFeaturedRepository, PostgresListingRepository,
    PostgresPushEndpointRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "souq_scheduler=debug,souq_engine=debug,souq_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = souq_store::app_config::Config::load()?;
    info!("Starting souq scheduler");

    let db = DbClient::new(&config.database.url).await?;
    db.migrate().await?;

    let listings: Arc<dyn ListingRepository> = Arc::new(PostgresListingRepository {
        pool: db.pool.clone(),
    });
    let featured: Arc<dyn FeaturedSelectionRepository> = Arc::new(PostgresFeaturedRepository {
        pool: db.pool.clone(),
    });
    let audit: Arc<dyn AuditSink> = Arc::new(PostgresAuditSink {
        pool: db.pool.clone(),
    });
    let endpoints: Arc<dyn PushEndpointRepository> = Arc::new(PostgresPushEndpointRepository {
        pool: db.pool.clone(),
    });
    let dispatcher = Arc::new(BatchingDispatcher::new(endpoints, Arc::new(NoopTransport)));

    let sweeper = ExpirySweeper::new(listings.clone());
    let selector = DailyDealSelector::new(
        listings,
        featured,
        audit,
        dispatcher,
        config.deals.clone(),
    );

    let sweep_interval = Duration::from_secs(config.scheduler.sweep_interval_seconds);
    let sweep_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            // sweep() logs and swallows its own failures.
            sweeper.sweep().await;
        }
    });

    let selection_hour = config.scheduler.daily_selection_hour;
    let selection_handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(until_next_local_hour(selection_hour)).await;
            info!("daily deal selection tick");
            match selector.run(Utc::now()).await {
                Ok(outcome) => info!(selected = outcome.selected_count, "daily selection finished"),
                Err(e) => error!("daily selection failed, next tick retries: {e}"),
            }
        }
    });

    let _ = tokio::try_join!(sweep_handle, selection_handle)?;
    Ok(())
}

/// Duration until the next occurrence of the given local hour.
fn until_next_local_hour(hour: u32) -> Duration {
    let now = Local::now();
    let target_time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).expect("valid hour");
    let mut target = now.date_naive().and_time(target_time);
    if target <= now.naive_local() {
        target += chrono::Duration::days(1);
    }
    let wait = target - now.naive_local();
    wait.to_std().unwrap_or(Duration::from_secs(60))
}

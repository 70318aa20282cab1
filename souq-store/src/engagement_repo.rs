use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use souq_core::models::{ListingEngagement, SaveResult};
use souq_core::repository::EngagementRepository;

pub struct PostgresEngagementRepository {
    pub pool: PgPool,
}

#[async_trait]
impl EngagementRepository for PostgresEngagementRepository {
    async fn increment_views(
        &self,
        listing_id: Uuid,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query(
            "INSERT INTO listing_engagement (listing_id, views) VALUES ($1, 1) \
             ON CONFLICT (listing_id) DO UPDATE SET views = listing_engagement.views + 1 \
             RETURNING views",
        )
        .bind(listing_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("views")?)
    }

    async fn record_save(
        &self,
        account_id: Uuid,
        listing_id: Uuid,
    ) -> Result<SaveResult, Box<dyn std::error::Error + Send + Sync>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO saved_listings (account_id, listing_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(account_id)
        .bind(listing_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(SaveResult::AlreadySaved);
        }

        let row = sqlx::query(
            "INSERT INTO listing_engagement (listing_id, saves) VALUES ($1, 1) \
             ON CONFLICT (listing_id) DO UPDATE SET saves = listing_engagement.saves + 1 \
             RETURNING saves",
        )
        .bind(listing_id)
        .fetch_one(&mut *tx)
        .await?;

        let saves: i64 = row.try_get("saves")?;
        tx.commit().await?;

        Ok(SaveResult::Recorded { saves })
    }

    async fn increment_clicks(
        &self,
        listing_id: Uuid,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query(
            "INSERT INTO listing_engagement (listing_id, clicks) VALUES ($1, 1) \
             ON CONFLICT (listing_id) DO UPDATE SET clicks = listing_engagement.clicks + 1 \
             RETURNING clicks",
        )
        .bind(listing_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("clicks")?)
    }

    async fn try_award_view_bonus(
        &self,
        listing_id: Uuid,
        threshold: i64,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        // 0-or-1 rows affected is the exactly-once guard: only the update
        // that performs the false -> true transition reports success.
        let result = sqlx::query(
            "UPDATE listing_engagement SET view_bonus_awarded = TRUE \
             WHERE listing_id = $1 AND view_bonus_awarded = FALSE AND views >= $2",
        )
        .bind(listing_id)
        .bind(threshold)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_award_save_bonus(
        &self,
        listing_id: Uuid,
        threshold: i64,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query(
            "UPDATE listing_engagement SET save_bonus_awarded = TRUE \
             WHERE listing_id = $1 AND save_bonus_awarded = FALSE AND saves >= $2",
        )
        .bind(listing_id)
        .bind(threshold)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_engagement(
        &self,
        listing_id: Uuid,
    ) -> Result<Option<ListingEngagement>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query(
            "SELECT listing_id, views, saves, clicks, view_bonus_awarded, save_bonus_awarded \
             FROM listing_engagement WHERE listing_id = $1",
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ListingEngagement {
            listing_id: row.try_get("listing_id")?,
            views: row.try_get("views")?,
            saves: row.try_get("saves")?,
            clicks: row.try_get("clicks")?,
            view_bonus_awarded: row.try_get("view_bonus_awarded")?,
            save_bonus_awarded: row.try_get("save_bonus_awarded")?,
        }))
    }
}

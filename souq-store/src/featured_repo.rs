use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use souq_core::models::FeaturedSelection;
use souq_core::repository::FeaturedSelectionRepository;

pub struct PostgresFeaturedRepository {
    pub pool: PgPool,
}

#[async_trait]
impl FeaturedSelectionRepository for PostgresFeaturedRepository {
    async fn exists_for_day(
        &self,
        day: NaiveDate,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query("SELECT 1 AS present FROM featured_batches WHERE selection_day = $1")
            .bind(day)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn prune_before(
        &self,
        day: NaiveDate,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        // Selections cascade from their batch marker.
        let result = sqlx::query("DELETE FROM featured_batches WHERE selection_day < $1")
            .bind(day)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn record_selections(
        &self,
        day: NaiveDate,
        listing_ids: &[Uuid],
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut tx = self.pool.begin().await?;

        // The primary key on the day marker is the mutual-exclusion point:
        // whichever process inserts it first owns the batch for that day.
        let marker = sqlx::query(
            "INSERT INTO featured_batches (selection_day) VALUES ($1) ON CONFLICT DO NOTHING",
        )
        .bind(day)
        .execute(&mut *tx)
        .await?;

        if marker.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for listing_id in listing_ids {
            sqlx::query(
                "INSERT INTO featured_selections (id, listing_id, selection_day) \
                 VALUES ($1, $2, $3)",
            )
            .bind(Uuid::new_v4())
            .bind(listing_id)
            .bind(day)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn selections_for_day(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<FeaturedSelection>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query(
            "SELECT id, listing_id, selection_day, created_at \
             FROM featured_selections WHERE selection_day = $1 ORDER BY created_at ASC",
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(FeaturedSelection {
                    id: row.try_get("id")?,
                    listing_id: row.try_get("listing_id")?,
                    selection_day: row.try_get("selection_day")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(Into::into)
    }
}

pub struct PostgresPushEndpointRepository {
    pub pool: PgPool,
}

#[async_trait]
impl souq_core::repository::PushEndpointRepository for PostgresPushEndpointRepository {
    async fn active_endpoints(
        &self,
        city_id: Option<Uuid>,
    ) -> Result<Vec<souq_core::models::PushEndpoint>, Box<dyn std::error::Error + Send + Sync>>
    {
        let rows = match city_id {
            Some(city_id) => {
                sqlx::query(
                    "SELECT p.id, p.account_id, p.token, p.created_at \
                     FROM push_endpoints p JOIN accounts a ON a.id = p.account_id \
                     WHERE a.is_active = TRUE AND a.city_id = $1",
                )
                .bind(city_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT p.id, p.account_id, p.token, p.created_at \
                     FROM push_endpoints p JOIN accounts a ON a.id = p.account_id \
                     WHERE a.is_active = TRUE",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter()
            .map(|row| {
                Ok(souq_core::models::PushEndpoint {
                    id: row.try_get("id")?,
                    account_id: row.try_get("account_id")?,
                    token: row.try_get("token")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(Into::into)
    }

    async fn remove_endpoints(
        &self,
        ids: &[Uuid],
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM push_endpoints WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

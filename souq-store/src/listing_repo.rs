use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use souq_core::models::{Listing, MerchantSummary, RankedListing};
use souq_core::repository::{CandidateFilter, DealWindow, ListingRepository};

pub struct PostgresListingRepository {
    pub pool: PgPool,
}

const RANKED_COLUMNS: &str = "l.id, l.merchant_id, l.title, l.description, l.original_price, \
     l.discounted_price, l.discount_percentage, l.image_url, l.is_active, l.is_suspicious, \
     l.report_count, l.expiry_date, l.created_at, \
     m.name AS merchant_name, m.trust_score, m.premium_until, m.is_verified, \
     m.city_id, m.area_id";

fn listing_from_row(row: &PgRow) -> Result<Listing, sqlx::Error> {
    Ok(Listing {
        id: row.try_get("id")?,
        merchant_id: row.try_get("merchant_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        original_price: row.try_get("original_price")?,
        discounted_price: row.try_get("discounted_price")?,
        discount_percentage: row.try_get("discount_percentage")?,
        image_url: row.try_get("image_url")?,
        is_active: row.try_get("is_active")?,
        is_suspicious: row.try_get("is_suspicious")?,
        report_count: row.try_get("report_count")?,
        expiry_date: row.try_get("expiry_date")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ranked_from_row(row: &PgRow) -> Result<RankedListing, sqlx::Error> {
    Ok(RankedListing {
        listing: listing_from_row(row)?,
        merchant: MerchantSummary {
            id: row.try_get("merchant_id")?,
            name: row.try_get("merchant_name")?,
            trust_score: row.try_get("trust_score")?,
            premium_until: row.try_get("premium_until")?,
            is_verified: row.try_get("is_verified")?,
            city_id: row.try_get("city_id")?,
            area_id: row.try_get("area_id")?,
        },
    })
}

#[async_trait]
impl ListingRepository for PostgresListingRepository {
    async fn create_listing(
        &self,
        listing: &Listing,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO listings (id, merchant_id, title, description, original_price, \
             discounted_price, discount_percentage, image_url, is_active, is_suspicious, \
             report_count, expiry_date, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(listing.id)
        .bind(listing.merchant_id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.original_price)
        .bind(listing.discounted_price)
        .bind(listing.discount_percentage)
        .bind(&listing.image_url)
        .bind(listing.is_active)
        .bind(listing.is_suspicious)
        .bind(listing.report_count)
        .bind(listing.expiry_date)
        .bind(listing.created_at)
        .execute(&mut *tx)
        .await?;

        // Engagement row is created together with the listing.
        sqlx::query("INSERT INTO listing_engagement (listing_id) VALUES ($1)")
            .bind(listing.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_listing(
        &self,
        id: Uuid,
    ) -> Result<Option<Listing>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query(
            "SELECT id, merchant_id, title, description, original_price, discounted_price, \
             discount_percentage, image_url, is_active, is_suspicious, report_count, \
             expiry_date, created_at FROM listings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| listing_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn delete_listing(
        &self,
        id: Uuid,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_active(
        &self,
        id: Uuid,
        active: bool,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query("UPDATE listings SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_report_count(
        &self,
        id: Uuid,
    ) -> Result<Option<i32>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query(
            "UPDATE listings SET report_count = report_count + 1 \
             WHERE id = $1 RETURNING report_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.try_get("report_count")).transpose()?)
    }

    async fn try_auto_hide(
        &self,
        id: Uuid,
        min_reports: i32,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query(
            "UPDATE listings SET is_active = FALSE \
             WHERE id = $1 AND is_active = TRUE AND report_count >= $2",
        )
        .bind(id)
        .bind(min_reports)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn deactivate_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query(
            "UPDATE listings SET is_active = FALSE WHERE expiry_date < $1 AND is_active = TRUE",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn feed_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<RankedListing>, Box<dyn std::error::Error + Send + Sync>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {RANKED_COLUMNS} FROM listings l \
             JOIN merchants m ON m.id = l.merchant_id \
             WHERE l.is_active = TRUE AND l.expiry_date >= "
        ));
        qb.push_bind(filter.now);
        qb.push(" AND m.trust_score >= ");
        qb.push_bind(filter.min_trust);

        if let Some(city_id) = filter.city_id {
            qb.push(" AND m.city_id = ");
            qb.push_bind(city_id);
        }
        if let Some(area_id) = filter.area_id {
            qb.push(" AND m.area_id = ");
            qb.push_bind(area_id);
        }
        if let Some(min_discount) = filter.min_discount {
            qb.push(" AND l.discount_percentage >= ");
            qb.push_bind(min_discount);
        }
        if let Some(max_discount) = filter.max_discount {
            qb.push(" AND l.discount_percentage <= ");
            qb.push_bind(max_discount);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(ranked_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn deal_candidates(
        &self,
        window: &DealWindow,
    ) -> Result<Vec<RankedListing>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query(&format!(
            "SELECT {RANKED_COLUMNS} FROM listings l \
             JOIN merchants m ON m.id = l.merchant_id \
             WHERE l.is_active = TRUE \
               AND l.is_suspicious = FALSE \
               AND l.discount_percentage >= $1 \
               AND l.report_count < $2 \
               AND l.expiry_date >= $3 AND l.expiry_date <= $4 \
               AND m.trust_score >= $5"
        ))
        .bind(window.min_discount)
        .bind(window.max_reports)
        .bind(window.now)
        .bind(window.until)
        .bind(window.min_trust)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(ranked_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn flagged_listings(
        &self,
        min_reports: i32,
        max_trust: i32,
    ) -> Result<Vec<RankedListing>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query(&format!(
            "SELECT {RANKED_COLUMNS} FROM listings l \
             JOIN merchants m ON m.id = l.merchant_id \
             WHERE l.is_suspicious = TRUE \
                OR l.report_count >= $1 \
                OR m.trust_score < $2 \
             ORDER BY l.report_count DESC, l.created_at DESC"
        ))
        .bind(min_reports)
        .bind(max_trust)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(ranked_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

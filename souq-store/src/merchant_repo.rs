use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use souq_core::models::{Merchant, TrustOutcome};
use souq_core::repository::MerchantRepository;

use crate::audit_log::insert_audit;

pub struct PostgresMerchantRepository {
    pub pool: PgPool,
}

const MERCHANT_COLUMNS: &str =
    "id, account_id, name, city_id, area_id, trust_score, premium_until, is_verified, created_at";

fn merchant_from_row(row: &PgRow) -> Result<Merchant, sqlx::Error> {
    Ok(Merchant {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        name: row.try_get("name")?,
        city_id: row.try_get("city_id")?,
        area_id: row.try_get("area_id")?,
        trust_score: row.try_get("trust_score")?,
        premium_until: row.try_get("premium_until")?,
        is_verified: row.try_get("is_verified")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl MerchantRepository for PostgresMerchantRepository {
    async fn get_merchant(
        &self,
        id: Uuid,
    ) -> Result<Option<Merchant>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query(&format!(
            "SELECT {MERCHANT_COLUMNS} FROM merchants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| merchant_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn merchant_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Option<Merchant>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query(&format!(
            "SELECT {MERCHANT_COLUMNS} FROM merchants WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| merchant_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn adjust_trust(
        &self,
        merchant_id: Uuid,
        delta: i32,
        block_below: i32,
        reason: &str,
    ) -> Result<Option<TrustOutcome>, Box<dyn std::error::Error + Send + Sync>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent adjustments on the same merchant;
        // score, audit, and block all commit or roll back together.
        let current = sqlx::query(
            "SELECT m.trust_score, m.account_id, a.is_active \
             FROM merchants m JOIN accounts a ON a.id = m.account_id \
             WHERE m.id = $1 FOR UPDATE",
        )
        .bind(merchant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        let previous_score: i32 = current.try_get("trust_score")?;
        let account_id: Uuid = current.try_get("account_id")?;
        let account_active: bool = current.try_get("is_active")?;

        let new_score = (previous_score + delta).clamp(0, 100);

        sqlx::query("UPDATE merchants SET trust_score = $2 WHERE id = $1")
            .bind(merchant_id)
            .bind(new_score)
            .execute(&mut *tx)
            .await?;

        insert_audit(&mut tx, "trust_score_change", "merchant", &merchant_id.to_string()).await?;

        let mut blocked = false;
        if new_score < block_below && account_active {
            let result = sqlx::query(
                "UPDATE accounts SET is_active = FALSE WHERE id = $1 AND is_active = TRUE",
            )
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 1 {
                insert_audit(&mut tx, "auto_block_merchant", "merchant", &merchant_id.to_string())
                    .await?;
                blocked = true;
            }
        }

        tx.commit().await?;

        tracing::debug!(
            merchant = %merchant_id,
            %reason,
            previous_score,
            new_score,
            "trust score adjusted"
        );

        Ok(Some(TrustOutcome {
            previous_score,
            new_score,
            blocked,
        }))
    }

    async fn is_account_active(
        &self,
        merchant_id: Uuid,
    ) -> Result<Option<bool>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query(
            "SELECT a.is_active FROM merchants m \
             JOIN accounts a ON a.id = m.account_id WHERE m.id = $1",
        )
        .bind(merchant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.try_get("is_active")).transpose()?)
    }

    async fn set_account_active(
        &self,
        merchant_id: Uuid,
        active: bool,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query(
            "UPDATE accounts SET is_active = $2 \
             WHERE id = (SELECT account_id FROM merchants WHERE id = $1) \
               AND is_active <> $2",
        )
        .bind(merchant_id)
        .bind(active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_verified(
        &self,
        merchant_id: Uuid,
        verified: bool,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query("UPDATE merchants SET is_verified = $2 WHERE id = $1")
            .bind(merchant_id)
            .bind(verified)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

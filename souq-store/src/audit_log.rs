use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use souq_core::repository::AuditSink;

/// Appends an audit row inside an open transaction so the entry commits
/// together with the change it describes.
pub(crate) async fn insert_audit(
    tx: &mut Transaction<'_, Postgres>,
    action: &str,
    entity_type: &str,
    entity_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO audit_log (action, entity_type, entity_id) VALUES ($1, $2, $3)")
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub struct PostgresAuditSink {
    pub pool: PgPool,
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn record(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("INSERT INTO audit_log (action, entity_type, entity_id) VALUES ($1, $2, $3)")
            .bind(action)
            .bind(entity_type)
            .bind(entity_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

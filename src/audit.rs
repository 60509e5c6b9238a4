use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

pub async fn log_audit(
    pool: &DbPool,
    actor_id: Option<i64>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, actor_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(actor_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

/// Writes an audit row, logging instead of failing when the insert fails.
pub async fn try_log_audit(
    pool: &DbPool,
    actor_id: Option<i64>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) {
    if let Err(err) = log_audit(pool, actor_id, action, resource, metadata).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}

use sea_orm::{ConnectionTrait, EntityTrait, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    entity::audit_logs::{ActiveModel as AuditActive, Entity as AuditLogs},
    error::AppResult,
};

pub async fn log_audit<C: ConnectionTrait>(
    conn: &C,
    user_id: Option<i32>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    let entry = AuditActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        action: Set(action.to_string()),
        resource: Set(resource.map(str::to_string)),
        metadata: Set(metadata),
        created_at: Set(chrono::Utc::now().into()),
    };
    AuditLogs::insert(entry).exec_without_returning(conn).await?;

    Ok(())
}

/// Audit writes never fail the request they describe.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    action: &str,
    resource: &str,
    metadata: Value,
) {
    if let Err(err) = log_audit(conn, Some(user_id), action, Some(resource), Some(metadata)).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}

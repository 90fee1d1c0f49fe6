//! Audit repository (审计数据访问)

use super::{AuditRepository, PgStore, StoreError};
use crate::models::audit::*;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
impl AuditRepository for PgStore {
    /// 插入审计日志
    async fn insert_audit_log(&self, log: &NewAuditLog) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, timestamp, ip_address, details)
            VALUES ($1, $2, $3, NOW(), $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.user_id)
        .bind(&log.action)
        .bind(&log.ip_address)
        .bind(&log.details)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

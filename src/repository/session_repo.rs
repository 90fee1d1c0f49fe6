//! Session repository (会话数据访问)

use super::{PgStore, SessionRepository, StoreError};
use crate::models::{
    session::{NewSession, Session},
    user::User,
};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
impl SessionRepository for PgStore {
    /// 插入会话（单条写入，不开事务）
    async fn insert_session(&self, session: &NewSession) -> Result<Session, StoreError> {
        let created = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, token, expires_at, ip_address, user_agent, created_at, last_active_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .fetch_one(&self.db)
        .await?;

        Ok(created)
    }

    /// 根据令牌查找会话及其用户
    async fn find_session_by_token(
        &self,
        token: &str,
    ) -> Result<Option<(Session, User)>, StoreError> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.db)
            .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(session.user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user.map(|user| (session, user)))
    }

    /// 刷新会话活跃时间
    async fn touch_session(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE sessions SET last_active_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// 删除会话
    async fn delete_session_by_token(&self, token: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

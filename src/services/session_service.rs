//! 会话服务：创建、校验、删除

use crate::{
    auth::jwt::{TokenKind, TokenService},
    error::AppError,
    models::{session::NewSession, user::UserSummary},
    repository::DataStore,
    services::within_deadline,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct SessionService {
    store: Arc<dyn DataStore>,
    tokens: Arc<TokenService>,
    deadline: Duration,
}

impl SessionService {
    pub fn new(store: Arc<dyn DataStore>, tokens: Arc<TokenService>, deadline: Duration) -> Self {
        Self {
            store,
            tokens,
            deadline,
        }
    }

    /// 创建会话并返回访问令牌；同一用户可同时持有多个会话
    pub async fn create(
        &self,
        user_id: Uuid,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<String, AppError> {
        let token = self.tokens.issue_access(user_id)?;

        let session = NewSession {
            user_id,
            token: token.clone(),
            expires_at: Utc::now() + self.tokens.lifetime(TokenKind::Access),
            ip_address: ip_address.map(|s| s.to_string()),
            user_agent: user_agent.map(|s| s.to_string()),
        };

        within_deadline(self.deadline, self.store.insert_session(&session)).await?;

        tracing::debug!(user_id = %user_id, "Session created");

        Ok(token)
    }

    /// 校验会话令牌
    ///
    /// 过期会话返回 `None` 但不清理（惰性失效）。命中时刷新 `last_active_at`。
    pub async fn validate(&self, token: &str) -> Result<Option<UserSummary>, AppError> {
        let found = within_deadline(self.deadline, self.store.find_session_by_token(token)).await?;

        let Some((session, user)) = found else {
            return Ok(None);
        };

        if session.is_expired_at(Utc::now()) {
            tracing::debug!(session_id = %session.id, "Session expired");
            return Ok(None);
        }

        within_deadline(self.deadline, self.store.touch_session(session.id)).await?;

        Ok(Some(user.summary()))
    }

    /// 删除会话。幂等：存储调用成功即返回 `true`，存储失败返回 `false`
    pub async fn delete(&self, token: &str) -> bool {
        match within_deadline(self.deadline, self.store.delete_session_by_token(token)).await {
            Ok(removed) => {
                tracing::debug!(removed, "Session deleted");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to delete session");
                false
            }
        }
    }
}

//! 审计日志服务

use crate::{models::audit::NewAuditLog, repository::DataStore, services::within_deadline};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 审计操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    // 认证相关
    Login,
    Register,
    SocialLogin,
    TokenRefresh,
    Logout,

    // 用户相关
    UserCreate,
    UserUpdate,
    UserDelete,
    PasswordUpdate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::Register => "REGISTER",
            AuditAction::SocialLogin => "SOCIAL_LOGIN",
            AuditAction::TokenRefresh => "TOKEN_REFRESH",
            AuditAction::Logout => "LOGOUT",

            AuditAction::UserCreate => "USER_CREATE",
            AuditAction::UserUpdate => "USER_UPDATE",
            AuditAction::UserDelete => "USER_DELETE",
            AuditAction::PasswordUpdate => "PASSWORD_UPDATE",
        }
    }
}

/// 单条审计记录
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub details: Option<Value>,
}

impl AuditEntry {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            user_id: None,
            ip_address: None,
            details: None,
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn ip(mut self, ip_address: Option<&str>) -> Self {
        self.ip_address = ip_address.map(|s| s.to_string());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// 审计落地接口。`record` 不返回错误，内部失败只记日志
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// 基于数据存储的审计服务
pub struct AuditService {
    store: Arc<dyn DataStore>,
    deadline: Duration,
}

impl AuditService {
    pub fn new(store: Arc<dyn DataStore>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    fn to_log(entry: AuditEntry) -> NewAuditLog {
        let action = entry.action.as_str();

        let details = match entry.details {
            Some(details) if !is_empty_details(&details) => details,
            _ => json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "source": "API",
                "type": action,
            }),
        };

        NewAuditLog {
            user_id: entry.user_id,
            action: action.to_string(),
            ip_address: entry.ip_address.as_deref().map(normalize_ip),
            details,
        }
    }
}

#[async_trait]
impl AuditSink for AuditService {
    async fn record(&self, entry: AuditEntry) {
        let action = entry.action;
        let log = Self::to_log(entry);

        if let Err(e) = within_deadline(self.deadline, self.store.insert_audit_log(&log)).await {
            tracing::warn!(
                action = action.as_str(),
                user_id = ?log.user_id,
                error = %e,
                "Failed to record audit log"
            );
        }
    }
}

fn is_empty_details(details: &Value) -> bool {
    match details {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// IPv4 映射的 IPv6 地址（`::ffff:a.b.c.d`）转为点分 IPv4，其余原样返回
pub fn normalize_ip(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        Ok(ip) => ip.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    #[test]
    fn test_normalize_ip() {
        assert_eq!(normalize_ip("::ffff:192.168.0.7"), "192.168.0.7");
        assert_eq!(normalize_ip("10.0.0.1"), "10.0.0.1");
        assert_eq!(normalize_ip("2001:db8::1"), "2001:db8::1");
        assert_eq!(normalize_ip("unknown"), "unknown");
    }

    #[test]
    fn test_action_names() {
        assert_eq!(AuditAction::SocialLogin.as_str(), "SOCIAL_LOGIN");
        assert_eq!(AuditAction::PasswordUpdate.as_str(), "PASSWORD_UPDATE");
    }

    #[tokio::test]
    async fn test_default_details_filled() {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditService::new(store.clone(), Duration::from_secs(1));

        audit
            .record(
                AuditEntry::new(AuditAction::Logout)
                    .ip(Some("::ffff:127.0.0.1"))
                    .details(json!({})),
            )
            .await;

        let logs = store.audit_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "LOGOUT");
        assert_eq!(logs[0].ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(logs[0].details["source"], "API");
        assert_eq!(logs[0].details["type"], "LOGOUT");
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let audit = AuditService::new(store.clone(), Duration::from_secs(1));

        audit.record(AuditEntry::new(AuditAction::Login)).await;

        store.set_unavailable(false);
        assert!(store.audit_logs().is_empty());
    }
}

//! Business logic services layer

pub mod audit_service;
pub mod auth_service;
pub mod permission_service;
pub mod session_service;
pub mod user_service;

pub use audit_service::{AuditAction, AuditEntry, AuditService, AuditSink};
pub use auth_service::AuthService;
pub use permission_service::PermissionService;
pub use session_service::SessionService;
pub use user_service::UserService;

use crate::error::AppError;
use std::future::Future;
use std::time::Duration;

/// 在截止时间内等待上游调用，超时映射为 `UpstreamUnavailable`
pub async fn within_deadline<T, E, F>(deadline: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AppError>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Upstream call timed out");
            Err(AppError::UpstreamUnavailable("deadline exceeded".to_string()))
        }
    }
}

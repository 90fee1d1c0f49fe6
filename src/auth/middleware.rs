//! 会话认证中间件

use crate::{
    error::AppError,
    models::{auth::RequestMeta, user::UserSummary},
    services::SessionService,
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::sync::Arc;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: UserSummary,
    /// 原始会话令牌，登出时使用
    pub token: String,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

// `Option<AuthContext>`：匿名请求得到 None
impl<S> OptionalFromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthContext>().cloned())
    }
}

/// 存储不可用而未能校验的 Bearer 令牌，仅由登出路由的中间件写入
#[derive(Debug, Clone)]
pub struct UnverifiedToken(pub String);

impl<S> OptionalFromRequestParts<S> for UnverifiedToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<UnverifiedToken>().cloned())
    }
}

// 由 client_meta_middleware 写入扩展；缺失时为空
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestMeta>()
            .cloned()
            .unwrap_or_default())
    }
}

/// 从 Authorization 头提取 Bearer 令牌
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}

/// 会话认证中间件
///
/// 令牌有效且账户启用时附加 `AuthContext`；无令牌、令牌无效或账户停用时请求保持匿名，
/// 由具体 handler 决定是否要求登录。存储不可用时直接返回错误。
pub async fn session_auth_middleware(
    State(sessions): State<Arc<SessionService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = extract_token(req.headers()) {
        let session = sessions.validate(&token).await?;
        attach_session(&mut req, token, session);
    }

    Ok(next.run(req).await)
}

/// 登出路由使用的会话中间件，永不失败
///
/// 存储不可用时附加 `UnverifiedToken`，登出仍会尝试删除会话并返回 `false`。
pub async fn logout_session_middleware(
    State(sessions): State<Arc<SessionService>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(req.headers()) {
        match sessions.validate(&token).await {
            Ok(session) => attach_session(&mut req, token, session),
            Err(e) => {
                tracing::warn!(error = %e, "Session validation failed during logout");
                req.extensions_mut().insert(UnverifiedToken(token));
            }
        }
    }

    next.run(req).await
}

fn attach_session(req: &mut Request, token: String, session: Option<UserSummary>) {
    match session {
        Some(user) if user.is_active => {
            req.extensions_mut().insert(AuthContext { user, token });
        }
        Some(user) => {
            tracing::debug!(user_id = %user.id, "Session belongs to a disabled account");
        }
        None => {
            tracing::debug!("Unknown or expired session token");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_valid() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer test_token_123".parse().unwrap());

        let token = extract_token(&headers).unwrap();
        assert_eq!(token, "test_token_123");
    }

    #[test]
    fn test_extract_token_missing() {
        let headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());
    }

    #[test]
    fn test_extract_token_invalid_format() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "InvalidFormat".parse().unwrap());
        assert!(extract_token(&headers).is_none());

        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert!(extract_token(&headers).is_none());
    }
}

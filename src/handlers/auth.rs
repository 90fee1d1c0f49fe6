//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::{AuthContext, UnverifiedToken},
    error::AppError,
    middleware::AppState,
    models::{auth::*, user::User},
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthPayload>, AppError> {
    let payload = state.auth_service.login(req, &meta).await?;
    Ok(Json(payload))
}

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = state.auth_service.register(req, &meta).await?;
    Ok((StatusCode::CREATED, Json(payload)))
}

/// 社交登录
pub async fn social_auth(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Json(req): Json<SocialAuthRequest>,
) -> Result<Json<AuthPayload>, AppError> {
    let payload = state.auth_service.social_auth(req, &meta).await?;
    Ok(Json(payload))
}

/// 刷新令牌
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<AuthPayload>, AppError> {
    let payload = state.auth_service.refresh_token(req, &meta).await?;
    Ok(Json(payload))
}

/// 登出，永不报错
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth_context: Option<AuthContext>,
    unverified: Option<UnverifiedToken>,
    meta: RequestMeta,
) -> Json<LogoutResponse> {
    let success = match (auth_context, unverified) {
        (None, Some(UnverifiedToken(token))) => {
            state.auth_service.logout_unverified(&token, &meta).await
        }
        (auth_context, _) => state.auth_service.logout(auth_context.as_ref(), &meta).await,
    };

    Json(LogoutResponse { success })
}

/// 当前用户；匿名请求返回 null
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth_context: Option<AuthContext>,
) -> Result<Json<Option<User>>, AppError> {
    let user = state.auth_service.me(auth_context.as_ref()).await?;
    Ok(Json(user))
}

//! 权限查询 HTTP 处理器

use crate::{auth::middleware::AuthContext, error::AppError, middleware::AppState};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PermissionCheckQuery {
    pub permission: String,
    pub site_domain: Option<String>,
    pub page_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PermissionCheckResponse {
    pub granted: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdminCheckQuery {
    pub site_domain: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminCheckResponse {
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_site_admin: Option<bool>,
}

/// 检查当前用户在给定作用域上的权限
pub async fn check_permission(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Query(query): Query<PermissionCheckQuery>,
) -> Result<Json<PermissionCheckResponse>, AppError> {
    let granted = state
        .permission_service
        .check_permission(
            auth_context.user.id,
            &query.permission,
            query.site_domain.as_deref(),
            query.page_path.as_deref(),
        )
        .await?;

    Ok(Json(PermissionCheckResponse { granted }))
}

/// 当前用户是否为系统管理员（以及给定站点的管理员）
pub async fn check_admin(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Query(query): Query<AdminCheckQuery>,
) -> Result<Json<AdminCheckResponse>, AppError> {
    let user_id = auth_context.user.id;
    let is_admin = state.permission_service.is_admin(user_id).await?;

    let is_site_admin = match query.site_domain.as_deref() {
        Some(domain) => Some(state.permission_service.is_site_admin(user_id, domain).await?),
        None => None,
    };

    Ok(Json(AdminCheckResponse {
        is_admin,
        is_site_admin,
    }))
}

//! 用户管理 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{auth::RequestMeta, user::*},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 用户列表（管理员）
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth_context: Option<AuthContext>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = state
        .user_service
        .list_users(auth_context.as_ref(), &query)
        .await?;
    Ok(Json(users))
}

/// 用户总数（管理员）
pub async fn count_users(
    State(state): State<Arc<AppState>>,
    auth_context: Option<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let count = state.user_service.count_users(auth_context.as_ref()).await?;
    Ok(Json(json!({ "count": count })))
}

/// 创建用户（管理员）
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth_context: Option<AuthContext>,
    meta: RequestMeta,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .user_service
        .create_user(auth_context.as_ref(), req, &meta)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// 获取用户
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth_context: Option<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = state.user_service.get_user(auth_context.as_ref(), id).await?;
    Ok(Json(user))
}

/// 更新用户资料
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth_context: Option<AuthContext>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .user_service
        .update_user(auth_context.as_ref(), id, req, &meta)
        .await?;
    Ok(Json(user))
}

/// 删除用户
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth_context: Option<AuthContext>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .user_service
        .delete_user(auth_context.as_ref(), id, &meta)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 修改本人密码
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth_context: Option<AuthContext>,
    meta: RequestMeta,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .user_service
        .change_password(auth_context.as_ref(), req, &meta)
        .await?;
    Ok(Json(json!({ "success": true })))
}

//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers, middleware::AppState};

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证路由
    let auth_routes = Router::new()
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/social", post(handlers::auth::social_auth))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh_token))
        .route("/api/v1/auth/me", get(handlers::auth::me));

    // 用户管理（本人或管理员）
    let user_routes = Router::new()
        .route(
            "/api/v1/users",
            get(handlers::user::list_users).post(handlers::user::create_user),
        )
        .route("/api/v1/users/count", get(handlers::user::count_users))
        .route(
            "/api/v1/users/{id}",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        .route("/api/v1/users/me/password", put(handlers::user::change_password));

    // 权限查询
    let permission_routes = Router::new()
        .route(
            "/api/v1/permissions/check",
            get(handlers::permission::check_permission),
        )
        .route("/api/v1/permissions/admin", get(handlers::permission::check_admin));

    // 会话中间件只附加上下文，是否必须登录由各 handler 决定
    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(user_routes)
        .merge(permission_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.session_service.clone(),
            crate::auth::middleware::session_auth_middleware,
        ));

    // 登出在存储不可用时也返回布尔结果
    let logout_routes = Router::new()
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .layer(axum::middleware::from_fn_with_state(
            state.session_service.clone(),
            crate::auth::middleware::logout_session_middleware,
        ));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(logout_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::client_meta_middleware,
        ))
        .layer(axum::middleware::from_fn(
            crate::middleware::request_tracking_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

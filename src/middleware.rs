//! HTTP 中间件
//! 应用状态、请求追踪与客户端信息提取

use crate::{
    auth::{jwt::TokenService, password::PasswordHasher, social::SocialCodeExchange},
    config::AppConfig,
    error::AppError,
    models::auth::RequestMeta,
    repository::DataStore,
    services::{
        audit_service::normalize_ip, AuditService, AuditSink, AuthService, PermissionService,
        SessionService, UserService,
    },
};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 服务在启动时构建一次，通过 `Arc` 在请求间共享。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DataStore>,
    pub session_service: Arc<SessionService>,
    pub auth_service: Arc<AuthService>,
    pub permission_service: Arc<PermissionService>,
    pub user_service: Arc<UserService>,
}

impl AppState {
    /// 基于存储句柄与社交授权码交换实现组装全部服务
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DataStore>,
        social: Arc<dyn SocialCodeExchange>,
    ) -> Result<Self, AppError> {
        let security = config.security.clone();
        let deadline = Duration::from_secs(security.upstream_timeout_secs);

        let tokens = Arc::new(TokenService::from_config(&security)?);
        let hasher = PasswordHasher::from_config(&security)?;

        let session_service = Arc::new(SessionService::new(store.clone(), tokens.clone(), deadline));
        let audit: Arc<dyn AuditSink> = Arc::new(AuditService::new(store.clone(), deadline));
        let permission_service = Arc::new(PermissionService::new(store.clone(), deadline));

        let auth_service = Arc::new(AuthService::new(
            store.clone(),
            tokens,
            session_service.clone(),
            audit.clone(),
            social,
            hasher.clone(),
            security.clone(),
        ));

        let user_service = Arc::new(UserService::new(
            store.clone(),
            permission_service.clone(),
            audit,
            hasher,
            security,
        ));

        Ok(Self {
            config,
            store,
            session_service,
            auth_service,
            permission_service,
            user_service,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 标签只用有限取值
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "OTHER",
        };
        let status_class = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_class)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 客户端信息中间件：解析来源 IP 与 User-Agent，写入请求扩展
pub async fn client_meta_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let meta = RequestMeta {
        ip_address: get_client_ip(req.headers(), peer, state.config.security.trust_proxy),
        user_agent: req
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    };

    req.extensions_mut().insert(meta);
    next.run(req).await
}

/// 获取客户端 IP 地址（已规范化）
fn get_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Option<String> {
    // 如果信任代理，从 X-Forwarded-For 获取
    if trust_proxy {
        // X-Forwarded-For 可能包含多个 IP，取第一个
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(ip) = forwarded {
            return Some(normalize_ip(ip));
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(ip) = real_ip {
            return Some(normalize_ip(ip));
        }
    }

    peer.map(|addr| normalize_ip(&addr.ip().to_string()))
}

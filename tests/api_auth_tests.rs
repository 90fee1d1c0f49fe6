//! 认证 API 集成测试

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{create_test_context, register_user, TEST_PASSWORD};

fn app(ctx: &common::TestContext) -> Router {
    site_auth::routes::create_router(ctx.state.clone())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_register_returns_created() {
    let ctx = create_test_context();

    let (status, json) = send(
        app(&ctx),
        post_json(
            "/api/v1/auth/register",
            json!({
                "email": "alice@example.com",
                "password": TEST_PASSWORD,
                "first_name": "Alice"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(json["token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["user"]["email"], "alice@example.com");
    assert!(json["user"].get("password_hash").is_none());

    // 审计记录使用转发头中的客户端地址
    let audit = ctx
        .store
        .audit_logs()
        .into_iter()
        .find(|l| l.action == "REGISTER")
        .unwrap();
    assert_eq!(audit.ip_address.as_deref(), Some("203.0.113.7"));
}

#[tokio::test]
async fn test_register_duplicate_conflict() {
    let ctx = create_test_context();
    register_user(&ctx, "alice@example.com").await;

    let (status, json) = send(
        app(&ctx),
        post_json(
            "/api/v1/auth/register",
            json!({ "email": "alice@example.com", "password": TEST_PASSWORD }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["kind"], "ALREADY_REGISTERED");
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let ctx = create_test_context();
    register_user(&ctx, "alice@example.com").await;

    let (status, json) = send(
        app(&ctx),
        post_json(
            "/api/v1/auth/login",
            json!({ "email": "alice@example.com", "password": TEST_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["token"].is_string());

    let (status, json) = send(
        app(&ctx),
        post_json(
            "/api/v1/auth/login",
            json!({ "email": "alice@example.com", "password": "WrongPass1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["kind"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_me_with_and_without_token() {
    let ctx = create_test_context();
    let payload = register_user(&ctx, "alice@example.com").await;

    let (status, json) = send(app(&ctx), get_with_token("/api/v1/auth/me", &payload.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["email"], "alice@example.com");

    let anonymous = Request::builder()
        .uri("/api/v1/auth/me")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app(&ctx), anonymous).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.is_null());

    // 未知会话令牌按匿名处理
    let (status, json) = send(app(&ctx), get_with_token("/api/v1/auth/me", "bogus")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.is_null());
}

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let ctx = create_test_context();
    let payload = register_user(&ctx, "alice@example.com").await;

    let (status, json) = send(
        app(&ctx),
        post_json(
            "/api/v1/auth/refresh",
            json!({ "refresh_token": payload.refresh_token }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(json["token"], payload.token.as_str());

    let (status, json) = send(
        app(&ctx),
        post_json("/api/v1/auth/refresh", json!({ "refresh_token": payload.token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["kind"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let ctx = create_test_context();
    let payload = register_user(&ctx, "alice@example.com").await;

    let logout = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", payload.token))
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app(&ctx), logout).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (_, json) = send(app(&ctx), get_with_token("/api/v1/auth/me", &payload.token)).await;
    assert!(json.is_null());

    let anonymous_logout = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/logout")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app(&ctx), anonymous_logout).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn test_social_login_unknown_provider() {
    let ctx = create_test_context();

    let (status, json) = send(
        app(&ctx),
        post_json(
            "/api/v1/auth/social",
            json!({ "provider": "myspace", "auth_code": "abc" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["kind"], "UNSUPPORTED_PROVIDER");
}

#[tokio::test]
async fn test_permission_check_requires_session() {
    let ctx = create_test_context();
    let payload = register_user(&ctx, "alice@example.com").await;

    let anonymous = Request::builder()
        .uri("/api/v1/permissions/check?permission=content.edit")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app(&ctx), anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["kind"], "UNAUTHENTICATED");

    let (status, json) = send(
        app(&ctx),
        get_with_token(
            "/api/v1/permissions/check?permission=content.edit",
            &payload.token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["granted"], false);
}

#[tokio::test]
async fn test_store_outage_surfaces_as_unavailable() {
    let ctx = create_test_context();
    let payload = register_user(&ctx, "alice@example.com").await;
    ctx.store.set_unavailable(true);

    let (status, json) = send(app(&ctx), get_with_token("/api/v1/auth/me", &payload.token)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["kind"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn test_logout_reports_false_when_store_is_down() {
    let ctx = create_test_context();
    let payload = register_user(&ctx, "alice@example.com").await;
    ctx.store.set_unavailable(true);

    let logout = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", payload.token))
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app(&ctx), logout).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);

    // 存储恢复后会话仍然有效
    ctx.store.set_unavailable(false);
    let (_, json) = send(app(&ctx), get_with_token("/api/v1/auth/me", &payload.token)).await;
    assert_eq!(json["email"], "alice@example.com");
}

//! 错误处理测试
//!
//! 测试错误类别、状态码和响应体格式

use axum::{http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;
use site_auth::error::AppError;

// ==================== 错误状态码测试 ====================

#[test]
fn test_error_status_codes() {
    assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::AccountDisabled.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::AlreadyRegistered.status_code(), StatusCode::CONFLICT);
    assert_eq!(
        AppError::UnsupportedProvider("myspace".to_string()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::UpstreamUnavailable("timeout".to_string()).status_code(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        AppError::Config("bad".to_string()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_error_kinds_are_distinct() {
    let kinds = [
        AppError::InvalidCredentials.kind(),
        AppError::AccountDisabled.kind(),
        AppError::AlreadyRegistered.kind(),
        AppError::UnsupportedProvider(String::new()).kind(),
        AppError::InvalidToken.kind(),
        AppError::Unauthenticated.kind(),
        AppError::Forbidden.kind(),
        AppError::NotFound.kind(),
        AppError::UpstreamUnavailable(String::new()).kind(),
        AppError::BadRequest(String::new()).kind(),
    ];

    let mut unique = kinds.to_vec();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), kinds.len());
}

// ==================== 用户消息测试 ====================

#[test]
fn test_user_messages_hide_internals() {
    let upstream = AppError::UpstreamUnavailable("connection refused on 10.0.0.5:5432".to_string());
    assert_eq!(upstream.user_message(), "Service temporarily unavailable");

    let config = AppError::Config("secret value xyz".to_string());
    assert!(!config.user_message().contains("xyz"));

    let bad = AppError::BadRequest("Password must contain at least one digit".to_string());
    assert_eq!(bad.user_message(), "Password must contain at least one digit");
}

#[test]
fn test_unknown_email_and_wrong_password_share_message() {
    // 两种失败都映射到同一错误，对外消息不提示邮箱是否存在
    let message = AppError::InvalidCredentials.user_message();
    assert!(!message.to_lowercase().contains("not found"));
}

// ==================== 响应体测试 ====================

#[tokio::test]
async fn test_error_response_body() {
    let response = AppError::Forbidden.into_response();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["error"]["code"], 403);
    assert_eq!(json["error"]["kind"], "FORBIDDEN");
    assert_eq!(json["error"]["message"], "Access denied");
    assert!(json["error"]["request_id"].is_string());
}

#[tokio::test]
async fn test_request_ids_are_unique() {
    let a = AppError::NotFound.into_response();
    let b = AppError::NotFound.into_response();

    let a: serde_json::Value =
        serde_json::from_slice(&a.into_body().collect().await.unwrap().to_bytes()).unwrap();
    let b: serde_json::Value =
        serde_json::from_slice(&b.into_body().collect().await.unwrap().to_bytes()).unwrap();

    assert_ne!(a["error"]["request_id"], b["error"]["request_id"]);
}

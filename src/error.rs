//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use crate::repository::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 邮箱或密码错误（与"邮箱不存在"对调用方不可区分）
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Email is already registered")]
    AlreadyRegistered,

    #[error("Unsupported social provider: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid refresh token")]
    InvalidToken,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    /// 存储或哈希依赖失败（包括超时）
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AppError::AccountDisabled | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::AlreadyRegistered => StatusCode::CONFLICT,
            AppError::UnsupportedProvider(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 错误类别标识，供客户端区分错误
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::AccountDisabled => "ACCOUNT_DISABLED",
            AppError::AlreadyRegistered => "ALREADY_REGISTERED",
            AppError::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound => "NOT_FOUND",
            AppError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Config(_) | AppError::Internal => "INTERNAL",
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::UnsupportedProvider(provider) => {
                format!("Unsupported social provider: {}", provider)
            }
            AppError::BadRequest(msg) => msg.clone(),
            AppError::UpstreamUnavailable(_) => "Service temporarily unavailable".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            other => other.to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub kind: &'static str,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                kind: self.kind(),
                message: self.user_message(),
                request_id,
            },
        };

        // 服务端错误记 error，客户端错误记 debug
        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::debug!(
                code = self.code(),
                kind = self.kind(),
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        (status, Json(error_response)).into_response()
    }
}

/// 存储层错误统一归为上游不可用
impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::UpstreamUnavailable(e.to_string())
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

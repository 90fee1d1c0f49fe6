//! Authentication-related models

use super::user::UserSummary;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub site_domain: Option<String>,
    pub page_path: Option<String>,
}

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub site_domain: Option<String>,
    pub page_path: Option<String>,
}

/// Social login request
#[derive(Debug, Deserialize)]
pub struct SocialAuthRequest {
    pub provider: String,
    pub auth_code: String,
    pub site_domain: Option<String>,
    pub page_path: Option<String>,
}

/// Token refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Token pair plus the public user view
#[derive(Debug, Clone, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

/// Caller network metadata, normalized by the HTTP layer
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

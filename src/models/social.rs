//! Social login models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configured social provider (name stored lowercase)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SocialProvider {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// Link between a local user and a provider account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSocialConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub provider_user_id: String,
    pub auth_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Identity returned by a provider code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider_user_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

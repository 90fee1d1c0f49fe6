//! Site and page models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Site {
    pub id: Uuid,
    pub domain: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub settings: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Page within a site
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    pub id: Uuid,
    pub site_id: Uuid,
    pub path: String,
    pub name: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

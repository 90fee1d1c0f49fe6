//! Role and permission domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 系统管理员角色名
pub const ADMIN_ROLE: &str = "admin";
/// 注册时默认分配的角色名
pub const DEFAULT_USER_ROLE: &str = "user";

/// Role (`site_id = None` means system-wide)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub site_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Permission
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

/// Role grant of a permission, narrowed to a site and/or page
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub site_id: Option<Uuid>,
    pub page_id: Option<Uuid>,
}

impl RolePermission {
    /// 该授权是否落在给定层级上（精确匹配，不做继承）
    pub fn matches(&self, scope: GrantScope) -> bool {
        match scope {
            GrantScope::Page(page_id) => self.page_id == Some(page_id),
            GrantScope::Site(site_id) => self.site_id == Some(site_id) && self.page_id.is_none(),
            GrantScope::System => self.site_id.is_none() && self.page_id.is_none(),
        }
    }
}

/// User <-> role assignment, joined with the role's name and scope
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub role_id: Uuid,
    /// Assignment-level site override (`None` = applies everywhere)
    pub site_id: Option<Uuid>,
    pub role_name: String,
    pub role_site_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One tier of the system ⊃ site ⊃ page lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantScope {
    /// `page_id = page`
    Page(Uuid),
    /// `site_id = site AND page_id IS NULL`
    Site(Uuid),
    /// `site_id IS NULL AND page_id IS NULL`
    System,
}

impl GrantScope {
    pub fn tier(&self) -> &'static str {
        match self {
            GrantScope::Page(_) => "page",
            GrantScope::Site(_) => "site",
            GrantScope::System => "system",
        }
    }
}

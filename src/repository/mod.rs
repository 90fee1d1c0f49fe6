//! Database repository layer
//!
//! 每个实体一组异步 trait，由 [`DataStore`] 汇总。服务层只依赖
//! `Arc<dyn DataStore>`，PostgreSQL 实现见 [`PgStore`]，测试使用 [`memory::MemoryStore`]。

pub mod audit_repo;
pub mod memory;
pub mod role_repo;
pub mod session_repo;
pub mod site_repo;
pub mod social_repo;
pub mod user_repo;

use crate::models::{
    audit::NewAuditLog,
    role::{GrantScope, Permission, Role, RoleAssignment, RolePermission},
    session::{NewSession, Session},
    site::{Page, Site},
    social::{SocialProvider, UserSocialConnection},
    user::{NewUser, UpdateUserRequest, User},
};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

pub use memory::MemoryStore;

/// 存储层错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 唯一约束冲突
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 按邮箱精确查找（区分大小写）
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;

    async fn update_user_password(&self, id: Uuid, password_hash: &str)
        -> Result<bool, StoreError>;

    async fn update_user_profile(
        &self,
        id: Uuid,
        update: &UpdateUserRequest,
    ) -> Result<Option<User>, StoreError>;

    /// 删除用户，级联删除会话、角色分配与社交连接
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;

    /// 按创建时间倒序分页
    async fn list_users(&self, skip: i64, take: i64) -> Result<Vec<User>, StoreError>;

    async fn count_users(&self) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: &NewSession) -> Result<Session, StoreError>;

    /// 按令牌精确查找会话及其所属用户
    async fn find_session_by_token(
        &self,
        token: &str,
    ) -> Result<Option<(Session, User)>, StoreError>;

    /// 更新 last_active_at
    async fn touch_session(&self, id: Uuid) -> Result<(), StoreError>;

    /// 返回删除的行数
    async fn delete_session_by_token(&self, token: &str) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// `site_id = None` 仅匹配系统级角色
    async fn find_role_by_name(
        &self,
        name: &str,
        site_id: Option<Uuid>,
    ) -> Result<Option<Role>, StoreError>;

    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        site_id: Option<Uuid>,
    ) -> Result<(), StoreError>;

    /// `Some(site)`：该站点的分配加上系统级分配；`None`：用户的全部分配
    async fn find_roles_for_user(
        &self,
        user_id: Uuid,
        site_id: Option<Uuid>,
    ) -> Result<Vec<RoleAssignment>, StoreError>;

    async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>, StoreError>;

    /// 在给定层级上查找任一角色的授权
    async fn find_role_permission(
        &self,
        role_ids: &[Uuid],
        permission_id: Uuid,
        scope: GrantScope,
    ) -> Result<Option<RolePermission>, StoreError>;
}

#[async_trait]
pub trait SiteRepository: Send + Sync {
    async fn find_site_by_domain(&self, domain: &str) -> Result<Option<Site>, StoreError>;

    async fn find_page_by_site_and_path(
        &self,
        site_id: Uuid,
        path: &str,
    ) -> Result<Option<Page>, StoreError>;
}

#[async_trait]
pub trait SocialRepository: Send + Sync {
    /// 名称已转为小写；仅返回启用的提供方
    async fn find_active_social_provider(
        &self,
        name: &str,
    ) -> Result<Option<SocialProvider>, StoreError>;

    /// 以 (provider_id, provider_user_id) 为键 upsert，重复调用时刷新 last_used_at
    async fn find_or_create_social_connection(
        &self,
        user_id: Uuid,
        provider_id: Uuid,
        provider_user_id: &str,
    ) -> Result<UserSocialConnection, StoreError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert_audit_log(&self, log: &NewAuditLog) -> Result<(), StoreError>;
}

/// 数据存储句柄
#[async_trait]
pub trait DataStore:
    UserRepository
    + SessionRepository
    + RoleRepository
    + SiteRepository
    + SocialRepository
    + AuditRepository
{
    /// 健康检查
    async fn ping(&self) -> Result<(), StoreError>;
}

/// PostgreSQL 存储实现
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

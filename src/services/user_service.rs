//! 用户服务：本人或管理员可访问的账户操作

use crate::{
    auth::{middleware::AuthContext, password::PasswordHasher},
    config::SecurityConfig,
    error::AppError,
    models::{
        auth::RequestMeta,
        user::{
            ChangePasswordRequest, CreateUserRequest, ListUsersQuery, NewUser, UpdateUserRequest,
            User,
        },
    },
    repository::{DataStore, StoreError},
    services::{within_deadline, AuditAction, AuditEntry, AuditSink, PermissionService},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

/// 分页默认值与上限
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

pub struct UserService {
    store: Arc<dyn DataStore>,
    permissions: Arc<PermissionService>,
    audit: Arc<dyn AuditSink>,
    hasher: PasswordHasher,
    security: SecurityConfig,
}

impl UserService {
    pub fn new(
        store: Arc<dyn DataStore>,
        permissions: Arc<PermissionService>,
        audit: Arc<dyn AuditSink>,
        hasher: PasswordHasher,
        security: SecurityConfig,
    ) -> Self {
        Self {
            store,
            permissions,
            audit,
            hasher,
            security,
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.security.upstream_timeout_secs)
    }

    /// 获取用户（本人或管理员）
    pub async fn get_user(&self, ctx: Option<&AuthContext>, id: Uuid) -> Result<User, AppError> {
        let ctx = ctx.ok_or(AppError::Unauthenticated)?;
        self.permissions.require_self_or_admin(ctx.user.id, id).await?;

        within_deadline(self.deadline(), self.store.find_user_by_id(id))
            .await?
            .ok_or(AppError::NotFound)
    }

    /// 用户列表（管理员），按创建时间倒序
    pub async fn list_users(
        &self,
        ctx: Option<&AuthContext>,
        query: &ListUsersQuery,
    ) -> Result<Vec<User>, AppError> {
        let ctx = ctx.ok_or(AppError::Unauthenticated)?;
        self.permissions.require_admin(ctx.user.id).await?;

        let skip = query.skip.unwrap_or(0).max(0);
        let take = query
            .take
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        within_deadline(self.deadline(), self.store.list_users(skip, take)).await
    }

    /// 用户总数（管理员）
    pub async fn count_users(&self, ctx: Option<&AuthContext>) -> Result<i64, AppError> {
        let ctx = ctx.ok_or(AppError::Unauthenticated)?;
        self.permissions.require_admin(ctx.user.id).await?;

        within_deadline(self.deadline(), self.store.count_users()).await
    }

    /// 创建用户（管理员）
    pub async fn create_user(
        &self,
        ctx: Option<&AuthContext>,
        req: CreateUserRequest,
        meta: &RequestMeta,
    ) -> Result<User, AppError> {
        let ctx = ctx.ok_or(AppError::Unauthenticated)?;
        self.permissions.require_admin(ctx.user.id).await?;

        req.validate()?;

        let existing = within_deadline(self.deadline(), self.store.find_user_by_email(&req.email))
            .await?;
        if existing.is_some() {
            return Err(AppError::AlreadyRegistered);
        }

        let password_hash = match req.password.as_deref() {
            Some(password) => {
                PasswordHasher::validate_password_policy(password, &self.security)?;
                Some(within_deadline(self.deadline(), self.hasher.hash_blocking(password)).await?)
            }
            None => None,
        };

        let new_user = NewUser {
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            is_active: req.is_active.unwrap_or(true),
            metadata: req.metadata,
        };

        let user = within_deadline(self.deadline(), async {
            self.store.create_user(&new_user).await.map_err(|e| match e {
                StoreError::Duplicate(_) => AppError::AlreadyRegistered,
                other => other.into(),
            })
        })
        .await?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::UserCreate)
                    .user(ctx.user.id)
                    .ip(meta.ip_address.as_deref())
                    .details(json!({ "created_user_id": user.id })),
            )
            .await;

        tracing::info!(user_id = %user.id, created_by = %ctx.user.id, "User created");

        Ok(user)
    }

    /// 更新资料（本人或管理员）
    pub async fn update_user(
        &self,
        ctx: Option<&AuthContext>,
        id: Uuid,
        req: UpdateUserRequest,
        meta: &RequestMeta,
    ) -> Result<User, AppError> {
        let ctx = ctx.ok_or(AppError::Unauthenticated)?;
        self.permissions.require_self_or_admin(ctx.user.id, id).await?;

        let user = within_deadline(self.deadline(), self.store.update_user_profile(id, &req))
            .await?
            .ok_or(AppError::NotFound)?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::UserUpdate)
                    .user(ctx.user.id)
                    .ip(meta.ip_address.as_deref())
                    .details(json!({ "target_user_id": id })),
            )
            .await;

        Ok(user)
    }

    /// 修改本人密码
    pub async fn change_password(
        &self,
        ctx: Option<&AuthContext>,
        req: ChangePasswordRequest,
        meta: &RequestMeta,
    ) -> Result<(), AppError> {
        let ctx = ctx.ok_or(AppError::Unauthenticated)?;

        let user = within_deadline(self.deadline(), self.store.find_user_by_id(ctx.user.id))
            .await?
            .ok_or(AppError::NotFound)?;

        let Some(current_hash) = user.password_hash.as_deref() else {
            return Err(AppError::BadRequest(
                "Account has no password (social login only)".to_string(),
            ));
        };

        let valid = within_deadline(
            self.deadline(),
            self.hasher.verify_blocking(&req.current_password, current_hash),
        )
        .await?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        PasswordHasher::validate_password_policy(&req.new_password, &self.security)?;

        let new_hash =
            within_deadline(self.deadline(), self.hasher.hash_blocking(&req.new_password)).await?;

        let updated = within_deadline(
            self.deadline(),
            self.store.update_user_password(user.id, &new_hash),
        )
        .await?;
        if !updated {
            return Err(AppError::NotFound);
        }

        self.audit
            .record(
                AuditEntry::new(AuditAction::PasswordUpdate)
                    .user(user.id)
                    .ip(meta.ip_address.as_deref()),
            )
            .await;

        tracing::info!(user_id = %user.id, "Password changed");

        Ok(())
    }

    /// 删除用户（本人或管理员）；会话、角色分配与社交连接一并删除
    pub async fn delete_user(
        &self,
        ctx: Option<&AuthContext>,
        id: Uuid,
        meta: &RequestMeta,
    ) -> Result<(), AppError> {
        let ctx = ctx.ok_or(AppError::Unauthenticated)?;
        self.permissions.require_self_or_admin(ctx.user.id, id).await?;

        let deleted = within_deadline(self.deadline(), self.store.delete_user(id)).await?;
        if !deleted {
            return Err(AppError::NotFound);
        }

        self.audit
            .record(
                AuditEntry::new(AuditAction::UserDelete)
                    .user(ctx.user.id)
                    .ip(meta.ip_address.as_deref())
                    .details(json!({ "deleted_user_id": id })),
            )
            .await;

        tracing::info!(user_id = %id, deleted_by = %ctx.user.id, "User deleted");

        Ok(())
    }
}

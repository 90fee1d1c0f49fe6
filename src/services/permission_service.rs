//! 权限检查服务
//!
//! 三级授权（页面 → 站点 → 系统），任一级命中即放行。

use crate::{
    error::AppError,
    models::role::{GrantScope, ADMIN_ROLE},
    repository::DataStore,
    services::within_deadline,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct PermissionService {
    store: Arc<dyn DataStore>,
    deadline: Duration,
}

impl PermissionService {
    pub fn new(store: Arc<dyn DataStore>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    /// 页面级权限检查（页面、站点、系统三级依次匹配）
    pub async fn has_permission_for_page(
        &self,
        user_id: Uuid,
        permission_code: &str,
        site_domain: &str,
        page_path: &str,
    ) -> Result<bool, AppError> {
        let Some(site) =
            within_deadline(self.deadline, self.store.find_site_by_domain(site_domain)).await?
        else {
            return Ok(false);
        };

        let Some(page) = within_deadline(
            self.deadline,
            self.store.find_page_by_site_and_path(site.id, page_path),
        )
        .await?
        else {
            return Ok(false);
        };

        self.check_tiers(
            user_id,
            permission_code,
            Some(site.id),
            &[
                GrantScope::Page(page.id),
                GrantScope::Site(site.id),
                GrantScope::System,
            ],
        )
        .await
    }

    /// 站点级权限检查（站点、系统两级）
    pub async fn has_permission_for_site(
        &self,
        user_id: Uuid,
        permission_code: &str,
        site_domain: &str,
    ) -> Result<bool, AppError> {
        let Some(site) =
            within_deadline(self.deadline, self.store.find_site_by_domain(site_domain)).await?
        else {
            return Ok(false);
        };

        self.check_tiers(
            user_id,
            permission_code,
            Some(site.id),
            &[GrantScope::Site(site.id), GrantScope::System],
        )
        .await
    }

    /// 系统级权限检查：只看系统级角色分配和系统级授权
    pub async fn has_system_permission(
        &self,
        user_id: Uuid,
        permission_code: &str,
    ) -> Result<bool, AppError> {
        self.check_tiers(user_id, permission_code, None, &[GrantScope::System])
            .await
    }

    /// 按给定的作用域分派到对应的检查；只有页面没有站点时拒绝
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        permission_code: &str,
        site_domain: Option<&str>,
        page_path: Option<&str>,
    ) -> Result<bool, AppError> {
        match (site_domain, page_path) {
            (Some(site), Some(page)) => {
                self.has_permission_for_page(user_id, permission_code, site, page)
                    .await
            }
            (Some(site), None) => {
                self.has_permission_for_site(user_id, permission_code, site)
                    .await
            }
            (None, None) => self.has_system_permission(user_id, permission_code).await,
            (None, Some(_)) => Ok(false),
        }
    }

    /// 检查权限，如果无权限则返回错误
    pub async fn require_permission(
        &self,
        user_id: Uuid,
        permission_code: &str,
        site_domain: Option<&str>,
        page_path: Option<&str>,
    ) -> Result<(), AppError> {
        let granted = self
            .check_permission(user_id, permission_code, site_domain, page_path)
            .await?;

        if !granted {
            tracing::warn!(
                user_id = %user_id,
                permission = %permission_code,
                site_domain = ?site_domain,
                page_path = ?page_path,
                "Permission denied"
            );
            return Err(AppError::Forbidden);
        }

        Ok(())
    }

    /// 是否持有系统级 admin 角色
    pub async fn is_admin(&self, user_id: Uuid) -> Result<bool, AppError> {
        let assignments =
            within_deadline(self.deadline, self.store.find_roles_for_user(user_id, None)).await?;

        Ok(assignments
            .iter()
            .any(|a| a.role_name == ADMIN_ROLE && a.role_site_id.is_none()))
    }

    /// 是否为站点管理员：系统级 admin，或该站点的 admin 角色
    pub async fn is_site_admin(&self, user_id: Uuid, site_domain: &str) -> Result<bool, AppError> {
        let Some(site) =
            within_deadline(self.deadline, self.store.find_site_by_domain(site_domain)).await?
        else {
            return Ok(false);
        };

        let assignments = within_deadline(
            self.deadline,
            self.store.find_roles_for_user(user_id, Some(site.id)),
        )
        .await?;

        Ok(assignments.iter().any(|a| {
            a.role_name == ADMIN_ROLE && (a.role_site_id.is_none() || a.role_site_id == Some(site.id))
        }))
    }

    pub async fn require_admin(&self, user_id: Uuid) -> Result<(), AppError> {
        if !self.is_admin(user_id).await? {
            tracing::warn!(user_id = %user_id, "Admin role required");
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    /// 本人或管理员
    pub async fn require_self_or_admin(&self, caller: Uuid, target: Uuid) -> Result<(), AppError> {
        if caller == target {
            return Ok(());
        }

        if !self.is_admin(caller).await? {
            tracing::warn!(
                caller = %caller,
                target = %target,
                "Access to another user's account denied"
            );
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    /// 加载角色与权限后按顺序逐级匹配，第一个命中的层级放行
    async fn check_tiers(
        &self,
        user_id: Uuid,
        permission_code: &str,
        site_id: Option<Uuid>,
        tiers: &[GrantScope],
    ) -> Result<bool, AppError> {
        let assignments =
            within_deadline(self.deadline, self.store.find_roles_for_user(user_id, site_id))
                .await?;

        // 系统级检查只认系统级分配
        let role_ids: Vec<Uuid> = assignments
            .iter()
            .filter(|a| site_id.is_some() || a.site_id.is_none())
            .map(|a| a.role_id)
            .collect();

        if role_ids.is_empty() {
            return Ok(false);
        }

        let Some(permission) =
            within_deadline(self.deadline, self.store.find_permission_by_code(permission_code))
                .await?
        else {
            return Ok(false);
        };

        for scope in tiers {
            let grant = within_deadline(
                self.deadline,
                self.store.find_role_permission(&role_ids, permission.id, *scope),
            )
            .await?;

            if grant.is_some() {
                tracing::debug!(
                    user_id = %user_id,
                    permission = %permission_code,
                    tier = scope.tier(),
                    "Permission granted"
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}

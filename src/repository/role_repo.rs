//! Role repository (角色数据访问)

use super::{PgStore, RoleRepository, StoreError};
use crate::models::role::*;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
impl RoleRepository for PgStore {
    // ==================== Roles ====================

    /// 根据名称和站点范围查找角色
    async fn find_role_by_name(
        &self,
        name: &str,
        site_id: Option<Uuid>,
    ) -> Result<Option<Role>, StoreError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE name = $1 AND site_id IS NOT DISTINCT FROM $2 LIMIT 1",
        )
        .bind(name)
        .bind(site_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(role)
    }

    // ==================== Role Assignments ====================

    /// 为用户分配角色
    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        site_id: Option<Uuid>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, site_id, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(site_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 获取用户的角色分配
    async fn find_roles_for_user(
        &self,
        user_id: Uuid,
        site_id: Option<Uuid>,
    ) -> Result<Vec<RoleAssignment>, StoreError> {
        let assignments = sqlx::query_as::<_, RoleAssignment>(
            r#"
            SELECT
                ur.user_id,
                ur.role_id,
                ur.site_id,
                r.name AS role_name,
                r.site_id AS role_site_id,
                ur.created_at
            FROM user_roles ur
            JOIN roles r ON ur.role_id = r.id
            WHERE ur.user_id = $1
              AND ($2::uuid IS NULL OR ur.site_id = $2 OR ur.site_id IS NULL)
            "#,
        )
        .bind(user_id)
        .bind(site_id)
        .fetch_all(&self.db)
        .await?;

        Ok(assignments)
    }

    // ==================== Permissions ====================

    /// 根据代码查找权限
    async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>, StoreError> {
        let permission = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.db)
            .await?;

        Ok(permission)
    }

    /// 在指定层级上查找角色授权
    async fn find_role_permission(
        &self,
        role_ids: &[Uuid],
        permission_id: Uuid,
        scope: GrantScope,
    ) -> Result<Option<RolePermission>, StoreError> {
        let (sql, scope_id) = match scope {
            GrantScope::Page(page_id) => (
                r#"
                SELECT role_id, permission_id, site_id, page_id
                FROM role_permissions
                WHERE role_id = ANY($1) AND permission_id = $2 AND page_id = $3
                LIMIT 1
                "#,
                Some(page_id),
            ),
            GrantScope::Site(site_id) => (
                r#"
                SELECT role_id, permission_id, site_id, page_id
                FROM role_permissions
                WHERE role_id = ANY($1) AND permission_id = $2 AND site_id = $3 AND page_id IS NULL
                LIMIT 1
                "#,
                Some(site_id),
            ),
            GrantScope::System => (
                r#"
                SELECT role_id, permission_id, site_id, page_id
                FROM role_permissions
                WHERE role_id = ANY($1) AND permission_id = $2 AND site_id IS NULL AND page_id IS NULL
                LIMIT 1
                "#,
                None,
            ),
        };

        let mut query = sqlx::query_as::<_, RolePermission>(sql)
            .bind(role_ids)
            .bind(permission_id);
        if let Some(scope_id) = scope_id {
            query = query.bind(scope_id);
        }

        Ok(query.fetch_optional(&self.db).await?)
    }
}

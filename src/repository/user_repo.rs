//! User repository (数据库访问层)

use super::{PgStore, StoreError, UserRepository};
use crate::models::user::*;
use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

#[async_trait]
impl UserRepository for PgStore {
    /// 根据邮箱查找用户
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 根据 ID 查找用户
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 创建用户
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, is_active, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .bind(&user.metadata)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Duplicate(format!("users.email = {}", user.email))
            }
            _ => StoreError::Database(e),
        })?;

        Ok(created)
    }

    /// 更新密码
    async fn update_user_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 更新资料
    async fn update_user_profile(
        &self,
        id: Uuid,
        update: &UpdateUserRequest,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                profile_image = COALESCE($4, profile_image),
                metadata = COALESCE($5, metadata),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.profile_image)
        .bind(&update.metadata)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// 删除用户（外键 ON DELETE CASCADE 清理会话、角色与社交连接）
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 列出用户
    async fn list_users(&self, skip: i64, take: i64) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(take)
        .bind(skip)
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    /// 统计用户数量
    async fn count_users(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?
            .get(0);

        Ok(count)
    }
}

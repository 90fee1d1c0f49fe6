//! Social repository (社交登录数据访问)

use super::{PgStore, SocialRepository, StoreError};
use crate::models::social::*;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
impl SocialRepository for PgStore {
    /// 查找启用的社交提供方
    async fn find_active_social_provider(
        &self,
        name: &str,
    ) -> Result<Option<SocialProvider>, StoreError> {
        let provider = sqlx::query_as::<_, SocialProvider>(
            "SELECT * FROM social_providers WHERE name = $1 AND is_active = TRUE LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?;

        Ok(provider)
    }

    /// 创建或刷新社交连接
    async fn find_or_create_social_connection(
        &self,
        user_id: Uuid,
        provider_id: Uuid,
        provider_user_id: &str,
    ) -> Result<UserSocialConnection, StoreError> {
        let connection = sqlx::query_as::<_, UserSocialConnection>(
            r#"
            INSERT INTO user_social_connections (
                id, user_id, provider_id, provider_user_id, auth_data, created_at, last_used_at
            )
            VALUES ($1, $2, $3, $4, '{}'::jsonb, NOW(), NOW())
            ON CONFLICT (provider_id, provider_user_id)
            DO UPDATE SET last_used_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(provider_id)
        .bind(provider_user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(connection)
    }
}

//! Site repository (站点与页面数据访问)

use super::{PgStore, SiteRepository, StoreError};
use crate::models::site::*;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
impl SiteRepository for PgStore {
    /// 根据域名查找站点
    async fn find_site_by_domain(&self, domain: &str) -> Result<Option<Site>, StoreError> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE domain = $1")
            .bind(domain)
            .fetch_optional(&self.db)
            .await?;

        Ok(site)
    }

    /// 根据站点和路径查找页面
    async fn find_page_by_site_and_path(
        &self,
        site_id: Uuid,
        path: &str,
    ) -> Result<Option<Page>, StoreError> {
        let page = sqlx::query_as::<_, Page>(
            "SELECT * FROM pages WHERE site_id = $1 AND path = $2 LIMIT 1",
        )
        .bind(site_id)
        .bind(path)
        .fetch_optional(&self.db)
        .await?;

        Ok(page)
    }
}

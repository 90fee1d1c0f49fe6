//! 内存存储实现
//!
//! 语义与 PostgreSQL 实现一致，供测试和本地开发使用。支持注入故障
//! （`set_unavailable`）和延迟（`set_latency`）以覆盖上游失败路径。

use super::{
    AuditRepository, DataStore, RoleRepository, SessionRepository, SiteRepository,
    SocialRepository, StoreError, UserRepository,
};
use crate::models::{
    audit::{AuditLog, NewAuditLog},
    role::{GrantScope, Permission, Role, RoleAssignment, RolePermission},
    session::{NewSession, Session},
    site::{Page, Site},
    social::{SocialProvider, UserSocialConnection},
    user::{NewUser, UpdateUserRequest, User},
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: Vec<User>,
    sessions: Vec<Session>,
    roles: Vec<Role>,
    user_roles: Vec<RoleAssignment>,
    permissions: Vec<Permission>,
    role_permissions: Vec<RolePermission>,
    sites: Vec<Site>,
    pages: Vec<Page>,
    providers: Vec<SocialProvider>,
    connections: Vec<UserSocialConnection>,
    audit_logs: Vec<AuditLog>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的所有调用都返回 `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 每次调用前等待给定时长
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(self.state())
    }

    // ==================== 测试数据 ====================

    pub fn insert_role(&self, name: &str, site_id: Option<Uuid>) -> Role {
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            site_id,
            created_at: Utc::now(),
        };
        self.state().roles.push(role.clone());
        role
    }

    /// 直接分配角色（不经过 trait，便于同步构造测试数据）
    pub fn grant_role(&self, user_id: Uuid, role: &Role, site_id: Option<Uuid>) {
        self.state().user_roles.push(RoleAssignment {
            user_id,
            role_id: role.id,
            site_id,
            role_name: role.name.clone(),
            role_site_id: role.site_id,
            created_at: Utc::now(),
        });
    }

    pub fn insert_permission(&self, code: &str) -> Permission {
        let permission = Permission {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
            description: None,
        };
        self.state().permissions.push(permission.clone());
        permission
    }

    pub fn grant_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        site_id: Option<Uuid>,
        page_id: Option<Uuid>,
    ) {
        self.state().role_permissions.push(RolePermission {
            role_id,
            permission_id,
            site_id,
            page_id,
        });
    }

    pub fn insert_site(&self, domain: &str) -> Site {
        let site = Site {
            id: Uuid::new_v4(),
            domain: domain.to_string(),
            name: domain.to_string(),
            description: None,
            is_active: true,
            settings: None,
            created_at: Utc::now(),
        };
        self.state().sites.push(site.clone());
        site
    }

    pub fn insert_page(&self, site_id: Uuid, path: &str) -> Page {
        let page = Page {
            id: Uuid::new_v4(),
            site_id,
            path: path.to_string(),
            name: path.to_string(),
            description: None,
            metadata: None,
        };
        self.state().pages.push(page.clone());
        page
    }

    pub fn insert_social_provider(&self, name: &str, is_active: bool) -> SocialProvider {
        let provider = SocialProvider {
            id: Uuid::new_v4(),
            name: name.to_lowercase(),
            description: None,
            is_active,
        };
        self.state().providers.push(provider.clone());
        provider
    }

    pub fn set_user_active(&self, user_id: Uuid, is_active: bool) {
        if let Some(user) = self.state().users.iter_mut().find(|u| u.id == user_id) {
            user.is_active = is_active;
        }
    }

    /// 将会话过期时间改到过去
    pub fn expire_session(&self, token: &str) {
        if let Some(session) = self.state().sessions.iter_mut().find(|s| s.token == token) {
            session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }

    pub fn sessions_for(&self, user_id: Uuid) -> Vec<Session> {
        self.state()
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn roles_of(&self, user_id: Uuid) -> Vec<RoleAssignment> {
        self.state()
            .user_roles
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn social_connections(&self) -> Vec<UserSocialConnection> {
        self.state().connections.clone()
    }

    pub fn audit_logs(&self) -> Vec<AuditLog> {
        self.state().audit_logs.clone()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.enter().await?;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let state = self.enter().await?;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut state = self.enter().await?;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("users.email = {}", user.email)));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            profile_image: None,
            is_active: user.is_active,
            metadata: user.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn update_user_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.enter().await?;
        match state.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = Some(password_hash.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        update: &UpdateUserRequest,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.enter().await?;
        let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        if let Some(first_name) = &update.first_name {
            user.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &update.last_name {
            user.last_name = Some(last_name.clone());
        }
        if let Some(profile_image) = &update.profile_image {
            user.profile_image = Some(profile_image.clone());
        }
        if let Some(metadata) = &update.metadata {
            user.metadata = Some(metadata.clone());
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.enter().await?;
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Ok(false);
        }

        state.sessions.retain(|s| s.user_id != id);
        state.user_roles.retain(|a| a.user_id != id);
        state.connections.retain(|c| c.user_id != id);
        Ok(true)
    }

    async fn list_users(&self, skip: i64, take: i64) -> Result<Vec<User>, StoreError> {
        let state = self.enter().await?;
        let mut users = state.users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(take.max(0) as usize)
            .collect())
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        let state = self.enter().await?;
        Ok(state.users.len() as i64)
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session(&self, session: &NewSession) -> Result<Session, StoreError> {
        let mut state = self.enter().await?;
        if state.sessions.iter().any(|s| s.token == session.token) {
            return Err(StoreError::Duplicate("sessions.token".to_string()));
        }

        let now = Utc::now();
        let created = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            created_at: now,
            last_active_at: now,
        };
        state.sessions.push(created.clone());
        Ok(created)
    }

    async fn find_session_by_token(
        &self,
        token: &str,
    ) -> Result<Option<(Session, User)>, StoreError> {
        let state = self.enter().await?;
        let Some(session) = state.sessions.iter().find(|s| s.token == token) else {
            return Ok(None);
        };

        Ok(state
            .users
            .iter()
            .find(|u| u.id == session.user_id)
            .map(|user| (session.clone(), user.clone())))
    }

    async fn touch_session(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.enter().await?;
        if let Some(session) = state.sessions.iter_mut().find(|s| s.id == id) {
            session.last_active_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<u64, StoreError> {
        let mut state = self.enter().await?;
        let before = state.sessions.len();
        state.sessions.retain(|s| s.token != token);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn find_role_by_name(
        &self,
        name: &str,
        site_id: Option<Uuid>,
    ) -> Result<Option<Role>, StoreError> {
        let state = self.enter().await?;
        Ok(state
            .roles
            .iter()
            .find(|r| r.name == name && r.site_id == site_id)
            .cloned())
    }

    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        site_id: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let mut state = self.enter().await?;
        let Some(role) = state.roles.iter().find(|r| r.id == role_id).cloned() else {
            return Err(StoreError::Unavailable(format!("role {} does not exist", role_id)));
        };

        let exists = state
            .user_roles
            .iter()
            .any(|a| a.user_id == user_id && a.role_id == role_id && a.site_id == site_id);
        if !exists {
            state.user_roles.push(RoleAssignment {
                user_id,
                role_id,
                site_id,
                role_name: role.name,
                role_site_id: role.site_id,
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn find_roles_for_user(
        &self,
        user_id: Uuid,
        site_id: Option<Uuid>,
    ) -> Result<Vec<RoleAssignment>, StoreError> {
        let state = self.enter().await?;
        Ok(state
            .user_roles
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter(|a| match site_id {
                Some(site_id) => a.site_id.is_none() || a.site_id == Some(site_id),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>, StoreError> {
        let state = self.enter().await?;
        Ok(state.permissions.iter().find(|p| p.code == code).cloned())
    }

    async fn find_role_permission(
        &self,
        role_ids: &[Uuid],
        permission_id: Uuid,
        scope: GrantScope,
    ) -> Result<Option<RolePermission>, StoreError> {
        let state = self.enter().await?;
        Ok(state
            .role_permissions
            .iter()
            .find(|rp| {
                role_ids.contains(&rp.role_id)
                    && rp.permission_id == permission_id
                    && rp.matches(scope)
            })
            .cloned())
    }
}

#[async_trait]
impl SiteRepository for MemoryStore {
    async fn find_site_by_domain(&self, domain: &str) -> Result<Option<Site>, StoreError> {
        let state = self.enter().await?;
        Ok(state.sites.iter().find(|s| s.domain == domain).cloned())
    }

    async fn find_page_by_site_and_path(
        &self,
        site_id: Uuid,
        path: &str,
    ) -> Result<Option<Page>, StoreError> {
        let state = self.enter().await?;
        Ok(state
            .pages
            .iter()
            .find(|p| p.site_id == site_id && p.path == path)
            .cloned())
    }
}

#[async_trait]
impl SocialRepository for MemoryStore {
    async fn find_active_social_provider(
        &self,
        name: &str,
    ) -> Result<Option<SocialProvider>, StoreError> {
        let state = self.enter().await?;
        Ok(state
            .providers
            .iter()
            .find(|p| p.name == name && p.is_active)
            .cloned())
    }

    async fn find_or_create_social_connection(
        &self,
        user_id: Uuid,
        provider_id: Uuid,
        provider_user_id: &str,
    ) -> Result<UserSocialConnection, StoreError> {
        let mut state = self.enter().await?;
        let now = Utc::now();

        if let Some(existing) = state
            .connections
            .iter_mut()
            .find(|c| c.provider_id == provider_id && c.provider_user_id == provider_user_id)
        {
            existing.last_used_at = Some(now);
            return Ok(existing.clone());
        }

        let connection = UserSocialConnection {
            id: Uuid::new_v4(),
            user_id,
            provider_id,
            provider_user_id: provider_user_id.to_string(),
            auth_data: serde_json::json!({}),
            created_at: now,
            last_used_at: Some(now),
        };
        state.connections.push(connection.clone());
        Ok(connection)
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn insert_audit_log(&self, log: &NewAuditLog) -> Result<(), StoreError> {
        let mut state = self.enter().await?;
        state.audit_logs.push(AuditLog {
            id: Uuid::new_v4(),
            user_id: log.user_id,
            action: log.action.clone(),
            timestamp: Utc::now(),
            ip_address: log.ip_address.clone(),
            details: log.details.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let _state = self.enter().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_roles_for_user_site_filter() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let site_a = Uuid::new_v4();
        let site_b = Uuid::new_v4();

        let system_role = store.insert_role("user", None);
        let editor = store.insert_role("editor", None);
        let viewer = store.insert_role("viewer", None);
        store.grant_role(user_id, &system_role, None);
        store.grant_role(user_id, &editor, Some(site_a));
        store.grant_role(user_id, &viewer, Some(site_b));

        let for_a = store.find_roles_for_user(user_id, Some(site_a)).await.unwrap();
        let names: Vec<_> = for_a.iter().map(|a| a.role_name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"user"));
        assert!(names.contains(&"editor"));

        let all = store.find_roles_for_user(user_id, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.find_user_by_email("a@example.com").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.ping().await.is_err());

        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let store = MemoryStore::new();
        let user = store
            .create_user(&NewUser {
                email: "cascade@example.com".to_string(),
                password_hash: None,
                first_name: None,
                last_name: None,
                is_active: true,
                metadata: None,
            })
            .await
            .unwrap();
        let role = store.insert_role("user", None);
        store.grant_role(user.id, &role, None);
        store
            .insert_session(&NewSession {
                user_id: user.id,
                token: "tok".to_string(),
                expires_at: Utc::now() + chrono::Duration::days(1),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(store.sessions_for(user.id).is_empty());
        assert!(store.roles_of(user.id).is_empty());
        assert!(!store.delete_user(user.id).await.unwrap());
    }
}

//! 认证服务：登录、注册、社交登录、令牌刷新、登出

use crate::{
    auth::{
        jwt::TokenService, middleware::AuthContext, password::PasswordHasher,
        social::SocialCodeExchange,
    },
    config::SecurityConfig,
    error::AppError,
    models::{
        auth::*,
        role::DEFAULT_USER_ROLE,
        user::{NewUser, User},
    },
    repository::{DataStore, StoreError},
    services::{within_deadline, AuditAction, AuditEntry, AuditSink, SessionService},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

pub struct AuthService {
    store: Arc<dyn DataStore>,
    tokens: Arc<TokenService>,
    sessions: Arc<SessionService>,
    audit: Arc<dyn AuditSink>,
    social: Arc<dyn SocialCodeExchange>,
    hasher: PasswordHasher,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn DataStore>,
        tokens: Arc<TokenService>,
        sessions: Arc<SessionService>,
        audit: Arc<dyn AuditSink>,
        social: Arc<dyn SocialCodeExchange>,
        hasher: PasswordHasher,
        security: SecurityConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            sessions,
            audit,
            social,
            hasher,
            security,
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.security.upstream_timeout_secs)
    }

    /// 用户登录
    pub async fn login(
        &self,
        req: LoginRequest,
        meta: &RequestMeta,
    ) -> Result<AuthPayload, AppError> {
        let user = within_deadline(self.deadline(), self.store.find_user_by_email(&req.email))
            .await?;

        // 邮箱不存在与密码错误返回同一错误
        let Some(user) = user else {
            record_login_failure("unknown_email");
            return Err(AppError::InvalidCredentials);
        };
        let Some(password_hash) = user.password_hash.as_deref() else {
            record_login_failure("no_password");
            return Err(AppError::InvalidCredentials);
        };

        let valid = within_deadline(
            self.deadline(),
            self.hasher.verify_blocking(&req.password, password_hash),
        )
        .await?;
        if !valid {
            record_login_failure("wrong_password");
            return Err(AppError::InvalidCredentials);
        }

        // 检查账户状态
        if !user.is_active {
            record_login_failure("account_disabled");
            return Err(AppError::AccountDisabled);
        }

        let payload = self.issue_payload(&user, meta).await?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::Login)
                    .user(user.id)
                    .ip(meta.ip_address.as_deref())
                    .details(json!({
                        "site_domain": req.site_domain,
                        "page_path": req.page_path,
                    })),
            )
            .await;

        metrics::counter!("auth_login_total", "result" => "success").increment(1);
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(payload)
    }

    /// 用户注册
    pub async fn register(
        &self,
        req: RegisterRequest,
        meta: &RequestMeta,
    ) -> Result<AuthPayload, AppError> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, &self.security)?;

        // 先查重，唯一约束冲突作为兜底
        let existing = within_deadline(self.deadline(), self.store.find_user_by_email(&req.email))
            .await?;
        if existing.is_some() {
            return Err(AppError::AlreadyRegistered);
        }

        let password_hash =
            within_deadline(self.deadline(), self.hasher.hash_blocking(&req.password)).await?;

        let new_user = NewUser {
            email: req.email.clone(),
            password_hash: Some(password_hash),
            first_name: req.first_name.clone(),
            last_name: req.last_name.clone(),
            is_active: true,
            metadata: None,
        };

        let user = within_deadline(self.deadline(), async {
            self.store.create_user(&new_user).await.map_err(|e| match e {
                StoreError::Duplicate(_) => AppError::AlreadyRegistered,
                other => other.into(),
            })
        })
        .await?;

        self.assign_default_role(user.id).await?;

        let payload = self.issue_payload(&user, meta).await?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::Register)
                    .user(user.id)
                    .ip(meta.ip_address.as_deref())
                    .details(json!({
                        "site_domain": req.site_domain,
                        "page_path": req.page_path,
                    })),
            )
            .await;

        metrics::counter!("auth_register_total").increment(1);
        tracing::info!(user_id = %user.id, "User registered");

        Ok(payload)
    }

    /// 社交登录：不存在的用户按外部身份邮箱自动创建
    pub async fn social_auth(
        &self,
        req: SocialAuthRequest,
        meta: &RequestMeta,
    ) -> Result<AuthPayload, AppError> {
        let provider_name = req.provider.to_lowercase();

        let provider = within_deadline(
            self.deadline(),
            self.store.find_active_social_provider(&provider_name),
        )
        .await?
        .ok_or_else(|| AppError::UnsupportedProvider(req.provider.clone()))?;

        let identity = within_deadline(
            self.deadline(),
            self.social.exchange_auth_code(&provider, &req.auth_code),
        )
        .await?;

        let existing = within_deadline(
            self.deadline(),
            self.store.find_user_by_email(&identity.email),
        )
        .await?;

        let user = match existing {
            Some(user) => user,
            None => {
                let first_name = identity
                    .display_name
                    .clone()
                    .unwrap_or_else(|| format!("{}User", req.provider));
                self.create_social_user(&identity.email, first_name).await?
            }
        };

        if !user.is_active {
            return Err(AppError::AccountDisabled);
        }

        within_deadline(
            self.deadline(),
            self.store.find_or_create_social_connection(
                user.id,
                provider.id,
                &identity.provider_user_id,
            ),
        )
        .await?;

        let payload = self.issue_payload(&user, meta).await?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::SocialLogin)
                    .user(user.id)
                    .ip(meta.ip_address.as_deref())
                    .details(json!({
                        "provider": req.provider,
                        "site_domain": req.site_domain,
                        "page_path": req.page_path,
                    })),
            )
            .await;

        metrics::counter!("auth_social_login_total", "provider" => provider.name.clone())
            .increment(1);
        tracing::info!(user_id = %user.id, provider = %provider.name, "Social login");

        Ok(payload)
    }

    /// 刷新令牌：签发新会话与新刷新令牌，旧刷新令牌不吊销
    pub async fn refresh_token(
        &self,
        req: RefreshTokenRequest,
        meta: &RequestMeta,
    ) -> Result<AuthPayload, AppError> {
        let claims = self.tokens.verify_refresh(&req.refresh_token).map_err(|e| {
            tracing::debug!(reason = %e, "Refresh token rejected");
            AppError::InvalidToken
        })?;
        let user_id = claims.user_id().map_err(|_| AppError::InvalidToken)?;

        let user = within_deadline(self.deadline(), self.store.find_user_by_id(user_id))
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !user.is_active {
            return Err(AppError::AccountDisabled);
        }

        let payload = self.issue_payload(&user, meta).await?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::TokenRefresh)
                    .user(user.id)
                    .ip(meta.ip_address.as_deref()),
            )
            .await;

        metrics::counter!("auth_token_refresh_total").increment(1);

        Ok(payload)
    }

    /// 登出。无会话上下文时视为成功；删除失败返回 false，不报错
    pub async fn logout(&self, ctx: Option<&AuthContext>, meta: &RequestMeta) -> bool {
        let Some(ctx) = ctx else {
            return true;
        };

        self.end_session(&ctx.token, Some(ctx.user.id), meta).await
    }

    /// 登出一个未能校验的会话令牌（校验时存储不可用）
    pub async fn logout_unverified(&self, token: &str, meta: &RequestMeta) -> bool {
        self.end_session(token, None, meta).await
    }

    async fn end_session(&self, token: &str, user_id: Option<Uuid>, meta: &RequestMeta) -> bool {
        let deleted = self.sessions.delete(token).await;

        let mut entry = AuditEntry::new(AuditAction::Logout).ip(meta.ip_address.as_deref());
        if let Some(user_id) = user_id {
            entry = entry.user(user_id);
        }
        self.audit.record(entry).await;

        if deleted {
            tracing::info!(user_id = ?user_id, "User logged out");
        } else {
            tracing::warn!(user_id = ?user_id, "Logout could not delete the session");
        }

        deleted
    }

    /// 当前用户（重新读取，反映最新状态）
    pub async fn me(&self, ctx: Option<&AuthContext>) -> Result<Option<User>, AppError> {
        let Some(ctx) = ctx else {
            return Ok(None);
        };

        within_deadline(self.deadline(), self.store.find_user_by_id(ctx.user.id)).await
    }

    /// 创建会话并签发刷新令牌
    async fn issue_payload(&self, user: &User, meta: &RequestMeta) -> Result<AuthPayload, AppError> {
        let token = self
            .sessions
            .create(
                user.id,
                meta.ip_address.as_deref(),
                meta.user_agent.as_deref(),
            )
            .await?;
        let refresh_token = self.tokens.issue_refresh(user.id)?;

        Ok(AuthPayload {
            token,
            refresh_token,
            user: user.summary(),
        })
    }

    /// 分配系统级默认角色；角色不存在时跳过
    async fn assign_default_role(&self, user_id: Uuid) -> Result<(), AppError> {
        let role = within_deadline(
            self.deadline(),
            self.store.find_role_by_name(DEFAULT_USER_ROLE, None),
        )
        .await?;

        match role {
            Some(role) => {
                within_deadline(self.deadline(), self.store.assign_role(user_id, role.id, None))
                    .await
            }
            None => {
                tracing::debug!("Default role '{}' not found, skipping", DEFAULT_USER_ROLE);
                Ok(())
            }
        }
    }

    async fn create_social_user(&self, email: &str, first_name: String) -> Result<User, AppError> {
        let new_user = NewUser {
            email: email.to_string(),
            password_hash: None,
            first_name: Some(first_name),
            last_name: None,
            is_active: true,
            metadata: None,
        };

        match within_deadline(self.deadline(), async {
            match self.store.create_user(&new_user).await {
                Ok(user) => Ok(Some(user)),
                // 并发的同一社交登录已建好用户
                Err(StoreError::Duplicate(_)) => Ok(None),
                Err(e) => Err(AppError::from(e)),
            }
        })
        .await?
        {
            Some(user) => {
                self.assign_default_role(user.id).await?;
                Ok(user)
            }
            None => within_deadline(self.deadline(), self.store.find_user_by_email(email))
                .await?
                .ok_or(AppError::Internal),
        }
    }
}

fn record_login_failure(reason: &'static str) {
    metrics::counter!("auth_login_total", "result" => "failure", "reason" => reason).increment(1);
    tracing::debug!(reason, "Login rejected");
}

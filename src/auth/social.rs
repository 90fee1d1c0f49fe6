//! 社交登录授权码交换

use crate::{
    error::AppError,
    models::social::{ExternalIdentity, SocialProvider},
};
use async_trait::async_trait;

/// 将提供方授权码换成外部身份
#[async_trait]
pub trait SocialCodeExchange: Send + Sync {
    async fn exchange_auth_code(
        &self,
        provider: &SocialProvider,
        code: &str,
    ) -> Result<ExternalIdentity, AppError>;
}

/// 确定性占位实现：不访问提供方，直接由授权码派生身份
#[derive(Debug, Clone, Default)]
pub struct PlaceholderCodeExchange;

#[async_trait]
impl SocialCodeExchange for PlaceholderCodeExchange {
    async fn exchange_auth_code(
        &self,
        provider: &SocialProvider,
        code: &str,
    ) -> Result<ExternalIdentity, AppError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::BadRequest("auth_code must not be empty".to_string()));
        }

        let provider_name = provider.name.to_lowercase();

        Ok(ExternalIdentity {
            provider_user_id: code.to_string(),
            email: format!("{}_{}@example.com", provider_name, code),
            display_name: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn provider(name: &str) -> SocialProvider {
        SocialProvider {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_placeholder_identity_is_deterministic() {
        let exchange = PlaceholderCodeExchange;
        let identity = exchange
            .exchange_auth_code(&provider("google"), "abc123")
            .await
            .unwrap();

        assert_eq!(identity.provider_user_id, "abc123");
        assert_eq!(identity.email, "google_abc123@example.com");

        let again = exchange
            .exchange_auth_code(&provider("google"), "abc123")
            .await
            .unwrap();
        assert_eq!(identity, again);
    }

    #[tokio::test]
    async fn test_empty_code_rejected() {
        let exchange = PlaceholderCodeExchange;
        let result = exchange.exchange_auth_code(&provider("github"), "  ").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}

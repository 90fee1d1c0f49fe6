//! JWT token generation and validation
//! Access and refresh tokens are signed with distinct secrets, so a token of
//! one class can never verify as the other.

use crate::{config::SecurityConfig, error::AppError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Token type (access or refresh)
    pub token_type: TokenKind,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
    #[error("token class mismatch")]
    WrongClass,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl KeyPair {
    fn new(secret: &str, lifetime_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::seconds(lifetime_secs as i64),
        }
    }
}

/// JWT service
pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenService {
    /// Create token service from config
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        let access_secret = config.access_token_secret.expose_secret();
        let refresh_secret = config.refresh_token_secret.expose_secret();

        // Ensure secrets are at least 32 bytes for HS256
        if access_secret.len() < 32 || refresh_secret.len() < 32 {
            return Err(AppError::Config("Token secret too short (min 32 chars)".to_string()));
        }
        if access_secret == refresh_secret {
            return Err(AppError::Config(
                "Access and refresh token secrets must differ".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            access: KeyPair::new(access_secret, config.access_token_exp_secs),
            refresh: KeyPair::new(refresh_secret, config.refresh_token_exp_secs),
            validation,
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Configured lifetime of the given token class
    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        self.keys(kind).lifetime
    }

    /// Generate access token
    pub fn issue_access(&self, user_id: Uuid) -> Result<String, AppError> {
        self.issue_with_lifetime(user_id, TokenKind::Access, self.access.lifetime)
    }

    /// Generate refresh token
    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, AppError> {
        self.issue_with_lifetime(user_id, TokenKind::Refresh, self.refresh.lifetime)
    }

    /// Generate a token with an explicit lifetime (negative yields an expired token)
    pub fn issue_with_lifetime(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        lifetime: Duration,
    ) -> Result<String, AppError> {
        self.issue_at(user_id, kind, Utc::now(), lifetime)
    }

    fn issue_at(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id.to_string(),
            token_type: kind,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding).map_err(|e| {
            tracing::error!("Failed to encode {:?} token: {:?}", kind, e);
            AppError::Internal
        })
    }

    /// Verify signature, expiry and class. Never panics; every failure is a `TokenError`.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                    _ => TokenError::Malformed,
                }
            })?
            .claims;

        if claims.token_type != kind {
            tracing::debug!(
                "Token type mismatch: expected {:?}, got {:?}",
                kind,
                claims.token_type
            );
            return Err(TokenError::WrongClass);
        }

        Ok(claims)
    }

    /// Validate access token specifically
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    /// Validate refresh token specifically
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenKind::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_security() -> SecurityConfig {
        SecurityConfig {
            access_token_secret: Secret::new("test_access_secret_32_characters_long!".to_string()),
            refresh_token_secret: Secret::new("test_refresh_secret_32_characters_long".to_string()),
            access_token_exp_secs: 604800,
            refresh_token_exp_secs: 2592000,
            hash_cost: 1,
            hash_memory_kib: 1024,
            password_min_length: 8,
            password_require_uppercase: true,
            password_require_digit: true,
            password_require_special: false,
            upstream_timeout_secs: 5,
            trust_proxy: true,
        }
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let service = TokenService::from_config(&test_security()).unwrap();
        let user_id = Uuid::new_v4();

        let token = service.issue_access(user_id).unwrap();
        let claims = service.verify_access(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.token_type, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 604800);
    }

    #[test]
    fn test_tokens_are_unique() {
        let service = TokenService::from_config(&test_security()).unwrap();
        let user_id = Uuid::new_v4();

        let a = service.issue_access(user_id).unwrap();
        let b = service.issue_access(user_id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_secret_rejected() {
        let mut security = test_security();
        security.refresh_token_secret = security.access_token_secret.clone();
        assert!(TokenService::from_config(&security).is_err());
    }

    #[test]
    fn test_invalid_token_fails() {
        let service = TokenService::from_config(&test_security()).unwrap();
        assert_eq!(service.verify_access("invalid_token"), Err(TokenError::Malformed));
        assert_eq!(service.verify_refresh("invalid_token"), Err(TokenError::Malformed));
    }
}

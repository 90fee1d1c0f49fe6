//! Password hashing and verification using Argon2id

use crate::{config::SecurityConfig, error::AppError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Password hasher with configurable parameters
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher from security config
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        Self::with_cost(config.hash_cost, config.hash_memory_kib)
    }

    /// `cost` is the Argon2 time cost (iterations), `memory_kib` the memory cost
    pub fn with_cost(cost: u32, memory_kib: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, cost, 1, None)
            .map_err(|e| AppError::Config(format!("Invalid Argon2 params: {}", e)))?;

        Ok(Self::from_params(params))
    }

    fn from_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hash a password; a fresh random salt is used for every call
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::UpstreamUnavailable(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored PHC hash.
    ///
    /// Returns `false` for a wrong password and for malformed hashes alike.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Failed to parse password hash: {:?}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Hash on the blocking thread pool
    pub async fn hash_blocking(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Hashing task failed: {}", e)))?
    }

    /// Verify on the blocking thread pool
    pub async fn verify_blocking(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let hasher = self.clone();
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Hashing task failed: {}", e)))
    }

    /// Validate password against policy
    pub fn validate_password_policy(
        password: &str,
        policy: &SecurityConfig,
    ) -> Result<(), AppError> {
        // Check length
        if password.chars().count() < policy.password_min_length {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                policy.password_min_length
            )));
        }

        // Check uppercase
        if policy.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::BadRequest(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        // Check digit
        if policy.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::BadRequest(
                "Password must contain at least one digit".to_string(),
            ));
        }

        // Check special character
        if policy.password_require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            return Err(AppError::BadRequest(
                "Password must contain at least one special character".to_string(),
            ));
        }

        Ok(())
    }
}

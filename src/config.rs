//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 访问令牌签名密钥
    pub access_token_secret: Secret<String>,
    /// 刷新令牌签名密钥（必须与访问令牌密钥不同）
    pub refresh_token_secret: Secret<String>,
    /// 访问令牌（及会话）过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 刷新令牌过期时间（秒）
    pub refresh_token_exp_secs: u64,
    /// 密码哈希成本（Argon2 迭代次数）
    pub hash_cost: u32,
    /// 密码哈希内存成本（KiB）
    pub hash_memory_kib: u32,
    /// 密码最小长度
    pub password_min_length: usize,
    /// 密码必须包含大写字母
    pub password_require_uppercase: bool,
    /// 密码必须包含数字
    pub password_require_digit: bool,
    /// 密码必须包含特殊字符
    pub password_require_special: bool,
    /// 存储与哈希调用的超时时间（秒）
    pub upstream_timeout_secs: u64,
    /// 是否信任 X-Forwarded-For 头
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default(
                "security.access_token_secret",
                "change-this-access-secret-in-production-32+",
            )?
            .set_default(
                "security.refresh_token_secret",
                "change-this-refresh-secret-in-production-32+",
            )?
            .set_default("security.access_token_exp_secs", 604800)?
            .set_default("security.refresh_token_exp_secs", 2592000)?
            .set_default("security.hash_cost", 10)?
            .set_default("security.hash_memory_kib", 19456)?
            .set_default("security.password_min_length", 0)?
            .set_default("security.password_require_uppercase", false)?
            .set_default("security.password_require_digit", false)?
            .set_default("security.password_require_special", false)?
            .set_default("security.upstream_timeout_secs", 10)?
            .set_default("security.trust_proxy", true)?;

        // 从环境变量加载配置（前缀为 SITEAUTH_）
        settings = settings.add_source(
            Environment::with_prefix("SITEAUTH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证签名密钥（至少 32 字符，且两类令牌必须使用不同密钥）
        let access = self.security.access_token_secret.expose_secret();
        let refresh = self.security.refresh_token_secret.expose_secret();
        if access.len() < 32 || refresh.len() < 32 {
            return Err(ConfigError::Message(
                "Token secrets must be at least 32 characters long".to_string(),
            ));
        }
        if access == refresh {
            return Err(ConfigError::Message(
                "Access and refresh token secrets must differ".to_string(),
            ));
        }

        // 验证令牌过期时间
        if self.security.access_token_exp_secs == 0 || self.security.refresh_token_exp_secs == 0 {
            return Err(ConfigError::Message(
                "Token lifetimes must be greater than zero".to_string(),
            ));
        }

        // 验证哈希成本
        if !(1..=64).contains(&self.security.hash_cost) {
            return Err(ConfigError::Message(
                "hash_cost must be between 1 and 64".to_string(),
            ));
        }

        // 验证密码策略（0 表示不限制长度）
        if self.security.password_min_length > 128 {
            return Err(ConfigError::Message(
                "password_min_length must not exceed 128".to_string(),
            ));
        }

        if self.security.upstream_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "upstream_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

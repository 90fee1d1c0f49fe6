//! 日志与指标初始化

use crate::config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化结构化日志
///
/// `RUST_LOG` 优先于配置中的级别。重复初始化（例如测试中）会被忽略。
pub fn init_telemetry(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let log_layer = match config.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
    };

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .try_init()
        .is_err()
    {
        return;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = %config.format,
        "Telemetry initialized"
    );
}

/// 注册指标说明；指标本身在首次使用时创建
pub fn init_metrics() {
    metrics::describe_counter!("http_requests_total", "HTTP requests by method and status");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
    metrics::describe_counter!("auth_login_total", "Password login attempts by result");
    metrics::describe_counter!("auth_register_total", "Successful registrations");
    metrics::describe_counter!("auth_social_login_total", "Successful social logins by provider");
    metrics::describe_counter!("auth_token_refresh_total", "Successful token refreshes");
    metrics::describe_gauge!("db_pool_size", "Open database connections");
    metrics::describe_gauge!("db_pool_idle", "Idle database connections");

    tracing::debug!("Metrics initialized");
}

//! site-auth 主入口

use site_auth::{
    auth::PlaceholderCodeExchange, config::AppConfig, db, handlers::health, middleware::AppState,
    repository::PgStore, routes, telemetry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("site-auth {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.<APP_ENV> 或 .env.local > .env
    if let Ok(env) = std::env::var("APP_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志与指标
    telemetry::init_telemetry(&config.logging);
    telemetry::init_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "site-auth starting...");

    // 3. 数据库连接池（表结构由外部迁移工具管理）
    let db_pool = db::create_pool(&config.database).await?;
    let store = Arc::new(PgStore::new(db_pool.clone()));

    // 4. 构建应用状态
    let app_state = Arc::new(AppState::new(
        config.clone(),
        store,
        Arc::new(PlaceholderCodeExchange),
    )?);

    // 5. 构建路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let grace = std::time::Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    if tokio::time::timeout(grace, db::close_pool(&db_pool)).await.is_err() {
        tracing::warn!("Graceful shutdown timeout reached while closing the database pool");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }
}

/// 打印帮助信息
fn print_help() {
    println!("site-auth {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: site-auth [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --version     Print version and exit");
    println!("  --help        Print this help and exit");
    println!();
    println!("Environment:");
    println!("  All settings come from SITEAUTH_* environment variables,");
    println!("  e.g. SITEAUTH_DATABASE__URL, SITEAUTH_SECURITY__ACCESS_TOKEN_SECRET");
}

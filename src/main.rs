use share_link_proxy::{
    build_router,
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    logging, AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 🔥 先单独读取 [log] 段，完整配置在日志就绪后再加载
    let log_config = load_log_config().await;

    // 🔥 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&log_config);

    info!("Share Link Proxy v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // 显式创建缓存与流水线
    let app_state = AppState::from_config(config)?;
    let sweeper = app_state.spawn_background_tasks();
    info!("应用状态初始化完成");

    let app = build_router(app_state);

    info!("服务器启动在: http://{}", addr);
    info!("在线播放: http://{}/view/<base64>", addr);
    info!("下载: http://{}/down/<base64>", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始关闭...");
        }
    }

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("应用已安全退出");

    Ok(())
}

/// 加载日志配置
///
/// 读取失败时返回默认配置
async fn load_log_config() -> share_link_proxy::config::LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(DEFAULT_CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into() {
                    return log_config;
                }
            }
        }
    }
    share_link_proxy::config::LogConfig::default()
}

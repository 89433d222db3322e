// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 分享页解析配置
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// 直链缓存配置
    #[serde(default)]
    pub cache: CacheConfig,
    /// 代理转发配置
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// 🔥 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    18890
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 分享页解析配置
///
/// 目标站点会拦截默认 UA，必须伪装成桌面浏览器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// 请求分享页时使用的 User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 承载直链的元素 id
    #[serde(default = "default_element_id")]
    pub element_id: String,
    /// 直链所在属性名
    #[serde(default = "default_attribute")]
    pub attribute: String,
    /// 分享页请求超时（秒）
    #[serde(default = "default_resolver_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_element_id() -> String {
    "downloadButton".to_string()
}

fn default_attribute() -> String {
    "href".to_string()
}

fn default_resolver_timeout_secs() -> u64 {
    30
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            element_id: default_element_id(),
            attribute: default_attribute(),
            timeout_secs: default_resolver_timeout_secs(),
        }
    }
}

/// 直链缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 是否启用缓存（关闭后每个请求都重新解析）
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// 缓存有效期（秒），默认 1 小时，与上游直链的过期窗口相当
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// 同一 key 并发未命中时是否合并解析（single-flight）
    #[serde(default)]
    pub coalesce_misses: bool,
    /// 过期条目清理间隔（秒），0 表示不启动清理任务
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl_secs(),
            coalesce_misses: false,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// 文件名来源策略
///
/// 调用方显式指定的文件名始终优先
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenameStrategy {
    /// 调用方 → 上游 Content-Disposition → 分享链接末段 → 默认名
    #[default]
    Upstream,
    /// 调用方 → 分享链接末段 → 默认名
    DerivedFromUrl,
    /// 调用方 → 默认名
    Override,
}

/// 代理转发配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// 文件名来源策略
    #[serde(default)]
    pub filename_strategy: FilenameStrategy,
    /// 兜底文件名
    #[serde(default = "default_fallback_filename")]
    pub fallback_filename: String,
    /// 连接上游文件服务器的超时（秒）
    ///
    /// 只限制建连，不限制传输总时长（大文件流式转发可能持续很久）
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_fallback_filename() -> String {
    "video.mp4".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    15
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            filename_strategy: FilenameStrategy::default(),
            fallback_filename: default_fallback_filename(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 50MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        Ok(config)
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<()> {
        if self.resolver.element_id.trim().is_empty() {
            anyhow::bail!("resolver.element_id 不能为空");
        }
        if self.resolver.attribute.trim().is_empty() {
            anyhow::bail!("resolver.attribute 不能为空");
        }
        if self.cache.enabled && self.cache.ttl_secs == 0 {
            anyhow::bail!("cache.ttl_secs 必须大于 0（如需关闭缓存请设置 cache.enabled = false）");
        }
        if self.proxy.fallback_filename.trim().is_empty() {
            anyhow::bail!("proxy.fallback_filename 不能为空");
        }
        Ok(())
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                let default_config = Self::default();

                // 文件已存在但内容有误时不覆盖，避免吞掉用户的修改
                if !std::path::Path::new(path).exists() {
                    if let Err(e) = default_config.save_to_file(path).await {
                        tracing::error!("保存默认配置失败: {}", e);
                    }
                }

                default_config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 18890);
        assert_eq!(config.resolver.element_id, "downloadButton");
        assert_eq!(config.resolver.attribute, "href");
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(!config.cache.coalesce_misses);
        assert_eq!(config.proxy.filename_strategy, FilenameStrategy::Upstream);
        assert_eq!(config.proxy.fallback_filename, "video.mp4");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [cache]
            ttl_secs = 60

            [proxy]
            filename_strategy = "derived_from_url"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.enabled);
        assert_eq!(config.proxy.filename_strategy, FilenameStrategy::DerivedFromUrl);
        assert_eq!(config.proxy.fallback_filename, "video.mp4");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());

        // 关闭缓存时 ttl 不参与校验
        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/app.toml");
        let path = path.to_str().unwrap();

        let mut config = AppConfig::default();
        config.server.port = 9000;
        config.cache.coalesce_misses = true;
        config.proxy.filename_strategy = FilenameStrategy::Override;
        config.save_to_file(path).await.unwrap();

        let loaded = AppConfig::load_from_file(path).await.unwrap();
        assert_eq!(loaded.server.port, 9000);
        assert!(loaded.cache.coalesce_misses);
        assert_eq!(loaded.proxy.filename_strategy, FilenameStrategy::Override);
    }

    #[tokio::test]
    async fn test_load_or_default_writes_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        let path_str = path.to_str().unwrap();

        let config = AppConfig::load_or_default(path_str).await;
        assert_eq!(config.server.port, 18890);
        assert!(path.exists());
    }
}

// 应用状态

use crate::cache::LinkCache;
use crate::config::AppConfig;
use crate::pipeline::LinkPipeline;
use crate::proxy::ProxyStreamer;
use crate::resolver::{HtmlShareResolver, ShareResolver};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 应用全局状态
///
/// 缓存在启动时显式创建并注入流水线，请求处理中不存在全局查找
#[derive(Clone)]
pub struct AppState {
    /// 应用配置（启动后只读）
    pub config: Arc<AppConfig>,
    /// 解析-缓存-转发流水线
    pub pipeline: LinkPipeline,
}

impl AppState {
    /// 按配置组装默认组件
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let resolver: Arc<dyn ShareResolver> = Arc::new(HtmlShareResolver::new(&config.resolver)?);
        let cache = config
            .cache
            .enabled
            .then(|| LinkCache::new(Duration::from_secs(config.cache.ttl_secs)));
        Self::with_resolver(config, resolver, cache)
    }

    /// 使用指定的解析器与缓存组装（测试可注入模拟解析器）
    pub fn with_resolver(
        config: AppConfig,
        resolver: Arc<dyn ShareResolver>,
        cache: Option<LinkCache>,
    ) -> anyhow::Result<Self> {
        let streamer = ProxyStreamer::new(&config.proxy)?;
        let pipeline = LinkPipeline::new(resolver, cache, streamer)
            .with_coalesced_misses(config.cache.coalesce_misses);

        info!(
            "流水线初始化完成: 缓存={}, TTL={}s, 合并未命中={}, 文件名策略={:?}",
            config.cache.enabled,
            config.cache.ttl_secs,
            config.cache.coalesce_misses,
            config.proxy.filename_strategy
        );

        Ok(Self {
            config: Arc::new(config),
            pipeline,
        })
    }

    /// 启动缓存过期清理任务（未启用缓存或间隔为 0 时不启动）
    pub fn spawn_background_tasks(&self) -> Option<tokio::task::JoinHandle<()>> {
        let interval = self.config.cache.sweep_interval_secs;
        let cache = self.pipeline.cache()?;
        if interval == 0 {
            return None;
        }
        info!("启动直链缓存清理任务，间隔 {}s", interval);
        Some(cache.spawn_sweeper(Duration::from_secs(interval)))
    }
}

// 直链缓存
//
// 分享链接 -> 最近一次解析出的直链，按 TTL 过期。
// 过期判断只看写入时间，与条目是否已被物理清理无关。

use crate::resolver::{DirectLink, SourceUrl};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// 默认缓存有效期：1 小时
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub direct_link: DirectLink,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    /// `now > created_at + ttl` 即视为不存在
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.created_at + self.ttl
    }
}

/// 直链缓存（多请求并发读写安全，单 key 整体替换）
#[derive(Debug, Clone)]
pub struct LinkCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl LinkCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 查询直链，不存在或已过期返回 None
    pub fn get(&self, source: &SourceUrl) -> Option<DirectLink> {
        let entry = self.entries.get(source.as_str())?;
        if entry.is_expired_at(Instant::now()) {
            debug!("缓存已过期: {}", source);
            return None;
        }
        Some(entry.direct_link.clone())
    }

    /// 写入直链，覆盖同 key 的旧条目
    pub fn set(&self, source: &SourceUrl, direct_link: DirectLink, ttl: Duration) {
        self.entries.insert(
            source.as_str().to_string(),
            CacheEntry {
                direct_link,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// 以默认有效期写入
    pub fn set_default(&self, source: &SourceUrl, direct_link: DirectLink) {
        self.set(source, direct_link, self.default_ttl);
    }

    /// 物理条目数（含尚未清理的过期条目）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 清理已过期条目，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// 启动后台清理任务
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即返回，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.purge_expired();
                if removed > 0 {
                    info!("已清理 {} 条过期直链缓存，剩余 {}", removed, cache.len());
                }
            }
        })
    }
}

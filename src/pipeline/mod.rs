// 解析-缓存-转发流水线
//
// LOOKUP → RESOLVING → STREAMING → (成功 | STALE → RE-RESOLVING → RE-STREAMING → 结束)
//
// 上游文件返回 >= 400 时最多重新解析一次，重试结果即为最终结果；
// 请求文件时网络失败直接返回 500。

pub mod types;

pub use types::{LinkOrigin, PipelineError, ProxyRequest, Stage, StreamOutcome};

use crate::cache::LinkCache;
use crate::common::SingleFlight;
use crate::proxy::ProxyStreamer;
use crate::resolver::{DirectLink, ShareResolver, SourceUrl};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// 流水线
#[derive(Clone)]
pub struct LinkPipeline {
    resolver: Arc<dyn ShareResolver>,
    /// None 表示关闭缓存
    cache: Option<LinkCache>,
    /// Some 表示开启同 key 未命中合并
    flights: Option<SingleFlight>,
    streamer: ProxyStreamer,
}

impl LinkPipeline {
    pub fn new(
        resolver: Arc<dyn ShareResolver>,
        cache: Option<LinkCache>,
        streamer: ProxyStreamer,
    ) -> Self {
        Self {
            resolver,
            cache,
            flights: None,
            streamer,
        }
    }

    /// 开启同 key 并发未命中合并
    ///
    /// 默认不合并：同一链接并发未命中时每个请求各自解析
    pub fn with_coalesced_misses(mut self, enabled: bool) -> Self {
        self.flights = enabled.then(SingleFlight::new);
        self
    }

    pub fn cache(&self) -> Option<&LinkCache> {
        self.cache.as_ref()
    }

    pub fn streamer(&self) -> &ProxyStreamer {
        &self.streamer
    }

    /// 执行完整流程，返回待转发的上游响应
    pub async fn execute(&self, request: &ProxyRequest) -> Result<StreamOutcome, PipelineError> {
        let span = tracing::info_span!(
            "pipeline",
            request_id = %uuid::Uuid::new_v4(),
            source = %request.source,
            mode = %request.mode,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &ProxyRequest) -> Result<StreamOutcome, PipelineError> {
        let source = &request.source;
        let range = request.range.as_deref();
        let mut resolutions = 0;

        debug!(stage = %Stage::Lookup, "查询直链缓存");
        let (link, origin) = match self.lookup(source) {
            Some(link) => {
                debug!("缓存命中: {}", link);
                (link, LinkOrigin::Cache)
            }
            None => {
                debug!(stage = %Stage::Resolving, "缓存未命中，解析分享页");
                let (link, resolved) = self.resolve_on_miss(source).await?;
                if resolved {
                    resolutions += 1;
                }
                let origin = if resolved {
                    LinkOrigin::Resolved
                } else {
                    LinkOrigin::Cache
                };
                (link, origin)
            }
        };

        debug!(stage = %Stage::Streaming, "请求文件: {}", link);
        match self.streamer.fetch(&link, range).await {
            Ok(upstream) if !upstream.is_failure() => {
                return Ok(StreamOutcome {
                    upstream,
                    origin,
                    resolutions,
                });
            }
            Ok(upstream) => {
                warn!(
                    stage = %Stage::Stale,
                    "直链返回 {}，判定失效，重新解析",
                    upstream.status()
                );
            }
            // 网络失败不代表直链失效，不进入重试
            Err(e) => {
                warn!("请求直链失败: {}", e);
                return Err(PipelineError::FileFetch(e));
            }
        }

        debug!(stage = %Stage::ReResolving, "忽略缓存重新解析");
        resolutions += 1;
        let fresh = match self.resolver.resolve(source).await {
            Ok(link) => link,
            Err(e) => {
                warn!("重新解析失败，放弃: {}", e);
                return Err(PipelineError::LinkExhausted(e));
            }
        };
        self.store(source, &fresh);

        debug!(stage = %Stage::ReStreaming, "使用新直链重试: {}", fresh);
        let upstream = self
            .streamer
            .fetch(&fresh, range)
            .await
            .map_err(PipelineError::FileFetch)?;
        if upstream.is_failure() {
            warn!("重试后上游仍返回 {}，原样透传", upstream.status());
        } else {
            info!("直链刷新成功");
        }

        Ok(StreamOutcome {
            upstream,
            origin: LinkOrigin::Refreshed,
            resolutions,
        })
    }

    fn lookup(&self, source: &SourceUrl) -> Option<DirectLink> {
        self.cache.as_ref()?.get(source)
    }

    /// 未命中时解析，返回 (直链, 是否真正调用了解析器)
    async fn resolve_on_miss(
        &self,
        source: &SourceUrl,
    ) -> Result<(DirectLink, bool), PipelineError> {
        let _flight = match &self.flights {
            Some(flights) => {
                let guard = flights.acquire(source.as_str()).await;
                // 等待期间可能已被其他请求写入
                if let Some(link) = self.lookup(source) {
                    debug!("等待合并解析后缓存命中: {}", link);
                    return Ok((link, false));
                }
                Some(guard)
            }
            None => None,
        };

        let link = self
            .resolver
            .resolve(source)
            .await
            .map_err(|e| log_first_failure(PipelineError::from_first_resolution(e)))?;
        self.store(source, &link);
        Ok((link, true))
    }

    /// 仅在解析成功后写缓存
    fn store(&self, source: &SourceUrl, link: &DirectLink) {
        if let Some(cache) = &self.cache {
            cache.set_default(source, link.clone());
            debug!("已写入直链缓存: {}", link);
        }
    }
}

fn log_first_failure(err: PipelineError) -> PipelineError {
    match &err {
        PipelineError::LinkNotFound(e) => info!("分享页中找不到直链: {}", e),
        other => warn!("解析分享页失败: {}", other),
    }
    err
}

// 分享页解析模块
//
// 抓取分享页面并从页面结构中提取文件直链。
// 本模块不做缓存也不做重试，由上层流水线负责。

pub mod markup;
pub mod types;

pub use markup::{AttributeLookup, HtmlDocument, LinkSelector, MarkupDocument};
pub use types::{DirectLink, ExtractionError, ResolveError, SourceUrl, ValidationError};

use crate::config::ResolverConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, Client, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 直链解析器
#[async_trait]
pub trait ShareResolver: Send + Sync {
    /// 解析分享页得到直链
    async fn resolve(&self, source: &SourceUrl) -> Result<DirectLink, ResolveError>;
}

/// 通过抓取分享页 HTML 解析直链
#[derive(Debug, Clone)]
pub struct HtmlShareResolver {
    client: Client,
    user_agent: String,
    selector: LinkSelector,
}

impl HtmlShareResolver {
    pub fn new(config: &ResolverConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create resolver HTTP client")?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            selector: LinkSelector::new(&config.element_id, &config.attribute),
        })
    }

    /// 从页面内容中提取直链，相对地址按页面地址补全
    ///
    /// 同步执行：HTML 文档不能跨 await 持有
    pub fn extract_link(&self, page_url: &Url, body: &str) -> Result<DirectLink, ExtractionError> {
        let doc = HtmlDocument::parse(body);
        let raw = self.selector.extract(&doc)?;

        let link = page_url
            .join(raw)
            .map_err(|e| ExtractionError::InvalidLink(format!("{}: {}", raw, e)))?;

        match link.scheme() {
            "http" | "https" => Ok(DirectLink::new(link.as_str())),
            _ => Err(ExtractionError::InvalidLink(raw.to_string())),
        }
    }
}

#[async_trait]
impl ShareResolver for HtmlShareResolver {
    async fn resolve(&self, source: &SourceUrl) -> Result<DirectLink, ResolveError> {
        info!("访问分享页面: {}", source);

        let response = self
            .client
            .get(source.as_str())
            .header(header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("分享页面返回异常状态码: status={}, url={}", status, source);
            return Err(ResolveError::Status(status));
        }

        // 重定向后以最终地址为基准补全相对链接
        let page_url = response.url().clone();
        let body = response.text().await?;
        debug!("分享页面响应: status={}, body_len={}", status, body.len());

        match self.extract_link(&page_url, &body) {
            Ok(link) => {
                info!("提取直链成功: {}", link);
                Ok(link)
            }
            Err(e) => {
                warn!("提取直链失败（文件可能已删除或设为私有）: {}, url={}", e, source);
                Err(e.into())
            }
        }
    }
}

// 文件流式转发
//
// 向直链发起请求（透传 Range），把上游状态码与响应体原样流回客户端

use super::disposition::{build_disposition, choose_filename, DispositionMode};
use crate::config::{FilenameStrategy, ProxyConfig};
use crate::resolver::{DirectLink, SourceUrl};
use anyhow::Context;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// 不向客户端转发的逐跳头
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
];

/// 上游文件响应（尚未读取响应体）
#[derive(Debug)]
pub struct UpstreamFile {
    pub link: DirectLink,
    response: reqwest::Response,
}

impl UpstreamFile {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// 上游状态码 >= 400 说明直链已失效或被拒绝
    pub fn is_failure(&self) -> bool {
        self.status().as_u16() >= 400
    }

    /// 读取全部响应体（测试与诊断用，正常转发走流式）
    pub async fn into_bytes(self) -> reqwest::Result<axum::body::Bytes> {
        self.response.bytes().await
    }
}

/// 响应头改写参数
#[derive(Debug, Clone)]
pub struct ResponseMeta<'a> {
    pub source: &'a SourceUrl,
    pub mode: DispositionMode,
    pub filename_override: Option<&'a str>,
}

/// 文件代理
#[derive(Debug, Clone)]
pub struct ProxyStreamer {
    client: Client,
    filename_strategy: FilenameStrategy,
    fallback_filename: String,
}

impl ProxyStreamer {
    pub fn new(config: &ProxyConfig) -> anyhow::Result<Self> {
        // 只限制建连时间，流式传输可能持续很久
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create proxy HTTP client")?;

        Ok(Self {
            client,
            filename_strategy: config.filename_strategy,
            fallback_filename: config.fallback_filename.clone(),
        })
    }

    /// 请求直链，Range 原样透传，未提供时不携带
    pub async fn fetch(
        &self,
        link: &DirectLink,
        range: Option<&str>,
    ) -> reqwest::Result<UpstreamFile> {
        let mut request = self.client.get(link.as_str());
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let response = request.send().await?;
        debug!(
            "上游文件响应: status={}, range={:?}, link={}",
            response.status(),
            range,
            link
        );

        Ok(UpstreamFile {
            link: link.clone(),
            response,
        })
    }

    /// 组装返回给客户端的响应
    ///
    /// 状态码原样透传（206 不能变成 200），响应体边读边发
    pub fn into_response(&self, upstream: UpstreamFile, meta: &ResponseMeta<'_>) -> Response {
        let status = upstream.status();
        let mut headers = HeaderMap::with_capacity(upstream.headers().len() + 4);
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        let upstream_disposition = upstream
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok());
        let filename = choose_filename(
            self.filename_strategy,
            meta.filename_override,
            upstream_disposition,
            meta.source,
            &self.fallback_filename,
        );

        headers.insert(
            header::CONTENT_DISPOSITION,
            build_disposition(meta.mode, &filename),
        );
        apply_cors_headers(&mut headers);

        let expected = upstream
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        info!(
            "开始转发: status={}, mode={}, filename={}, length={:?}",
            status, meta.mode, filename, expected
        );

        // 客户端断开时 body 被 drop，上游流随之释放，不会继续读完
        let mut tracker = TransferTracker::new(upstream.link.clone(), expected);
        let stream = upstream.response.bytes_stream().inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                tracker.record(bytes.len());
            }
        });

        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// 播放器跨域读取 Range/Length 所需的响应头
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Range"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Range, Content-Length"),
    );
}

/// 判断是否为逐跳头
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// 传输统计，随响应流一起 drop
struct TransferTracker {
    link: DirectLink,
    expected: Option<u64>,
    sent: u64,
}

impl TransferTracker {
    fn new(link: DirectLink, expected: Option<u64>) -> Self {
        Self {
            link,
            expected,
            sent: 0,
        }
    }

    fn record(&mut self, n: usize) {
        self.sent += n as u64;
    }
}

impl Drop for TransferTracker {
    fn drop(&mut self) {
        match self.expected {
            Some(total) if self.sent < total => info!(
                "转发提前结束（客户端断开）: 已发送 {}/{} 字节, link={}",
                self.sent, total, self.link
            ),
            _ => debug!("转发结束: 已发送 {} 字节, link={}", self.sent, self.link),
        }
    }
}

// 流式代理处理器

use crate::pipeline::{PipelineError, ProxyRequest};
use crate::proxy::{apply_cors_headers, DispositionMode, ResponseMeta};
use crate::resolver::SourceUrl;
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::Deserialize;
use tracing::info;

/// 路径式接口的查询参数
#[derive(Debug, Default, Deserialize)]
pub struct FilenameQuery {
    /// 指定下载文件名
    pub filename: Option<String>,
}

/// 直接传链接的查询参数
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// 分享页链接
    pub url: String,
    /// inline / attachment
    #[serde(default)]
    pub mode: DispositionMode,
    /// 指定下载文件名
    pub filename: Option<String>,
}

/// 在线播放
///
/// GET /view/{base64(分享链接)}?filename=xxx
pub async fn view(
    State(state): State<AppState>,
    Path(encoded): Path<String>,
    Query(query): Query<FilenameQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let raw = decode_source(&encoded)?;
    resolve_and_stream(&state, &raw, DispositionMode::Inline, query.filename, &headers).await
}

/// 下载
///
/// GET /down/{base64(分享链接)}?filename=xxx
pub async fn down(
    State(state): State<AppState>,
    Path(encoded): Path<String>,
    Query(query): Query<FilenameQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let raw = decode_source(&encoded)?;
    resolve_and_stream(&state, &raw, DispositionMode::Attachment, query.filename, &headers).await
}

/// 不经 base64 包装的接口
///
/// GET /stream?url=https://...&mode=attachment&filename=xxx
pub async fn stream(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    // 提取失败也走 ApiError，保证错误响应同样带 CORS 头
    let Query(query) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    resolve_and_stream(&state, &query.url, query.mode, query.filename, &headers).await
}

/// CORS 预检
pub async fn preflight() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    apply_cors_headers(headers);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, HEAD, OPTIONS"),
    );
    response
}

/// 校验链接 → 执行流水线 → 组装流式响应
pub async fn resolve_and_stream(
    state: &AppState,
    raw_source: &str,
    mode: DispositionMode,
    filename: Option<String>,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    // 校验失败时不发起任何网络请求
    let source = SourceUrl::parse(raw_source).map_err(PipelineError::from)?;

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    info!("API: 代理请求 mode={}, range={:?}, source={}", mode, range, source);

    let request = ProxyRequest::new(source, mode)
        .with_range(range)
        .with_filename(filename);

    let outcome = state.pipeline.execute(&request).await?;

    let meta = ResponseMeta {
        source: &request.source,
        mode: request.mode,
        filename_override: request.filename_override.as_deref(),
    };
    Ok(state.pipeline.streamer().into_response(outcome.upstream, &meta))
}

/// 解码路径中的分享链接（标准与 URL 安全字母表都接受）
pub fn decode_source(encoded: &str) -> ApiResult<String> {
    let encoded = encoded.trim().trim_start_matches('/');
    let bytes = STANDARD
        .decode(encoded)
        .or_else(|_| URL_SAFE.decode(encoded))
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
        .map_err(|e| ApiError::InvalidEncoding(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| ApiError::InvalidEncoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_standard_and_url_safe() {
        let url = "https://www.example.com/file/abc/video.mp4/file?dkey=x~y";
        assert_eq!(decode_source(&STANDARD.encode(url)).unwrap(), url);
        assert_eq!(decode_source(&URL_SAFE_NO_PAD.encode(url)).unwrap(), url);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_source("***not base64***"),
            Err(ApiError::InvalidEncoding(_))
        ));
    }
}

// 流水线类型定义

use crate::proxy::{DispositionMode, UpstreamFile};
use crate::resolver::{ExtractionError, ResolveError, SourceUrl, ValidationError};
use axum::http::StatusCode;
use std::fmt;
use thiserror::Error;

/// 一次代理请求
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub source: SourceUrl,
    pub mode: DispositionMode,
    /// 入站 Range 头原文
    pub range: Option<String>,
    /// 调用方指定的文件名
    pub filename_override: Option<String>,
}

impl ProxyRequest {
    pub fn new(source: SourceUrl, mode: DispositionMode) -> Self {
        Self {
            source,
            mode,
            range: None,
            filename_override: None,
        }
    }

    pub fn with_range(mut self, range: Option<String>) -> Self {
        self.range = range;
        self
    }

    pub fn with_filename(mut self, filename: Option<String>) -> Self {
        self.filename_override = filename;
        self
    }
}

/// 流水线阶段（用于日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lookup,
    Resolving,
    Streaming,
    Stale,
    ReResolving,
    ReStreaming,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Lookup => "LOOKUP",
            Stage::Resolving => "RESOLVING",
            Stage::Streaming => "STREAMING",
            Stage::Stale => "STALE",
            Stage::ReResolving => "RE-RESOLVING",
            Stage::ReStreaming => "RE-STREAMING",
        };
        f.write_str(s)
    }
}

/// 直链来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOrigin {
    /// 命中缓存
    Cache,
    /// 首次解析
    Resolved,
    /// 失效后重新解析
    Refreshed,
}

/// 流水线成功结果（上游状态码可能仍是 4xx/5xx，原样透传）
#[derive(Debug)]
pub struct StreamOutcome {
    pub upstream: UpstreamFile,
    pub origin: LinkOrigin,
    /// 本次请求调用解析器的次数
    pub resolutions: u32,
}

/// 流水线失败
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 分享链接不是 http/https
    #[error(transparent)]
    InvalidSource(#[from] ValidationError),
    /// 首次解析时页面上找不到直链（文件已删除或私有）
    #[error("文件不存在或已被删除: {0}")]
    LinkNotFound(ExtractionError),
    /// 请求分享页失败
    #[error("分享页面请求失败: {0}")]
    PageFetch(ResolveError),
    /// 直链失效且重新解析失败
    #[error("直链已失效且无法刷新: {0}")]
    LinkExhausted(ResolveError),
    /// 请求直链时网络失败
    #[error("请求文件失败: {0}")]
    FileFetch(#[source] reqwest::Error),
}

impl PipelineError {
    /// 映射到 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::InvalidSource(_) => StatusCode::BAD_REQUEST,
            PipelineError::LinkNotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::LinkExhausted(_) => StatusCode::GONE,
            PipelineError::PageFetch(_) | PipelineError::FileFetch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 首次解析失败的分类：找不到直链 → 404，其余 → 500
    pub fn from_first_resolution(err: ResolveError) -> Self {
        match err {
            ResolveError::Extraction(e) => PipelineError::LinkNotFound(e),
            other => PipelineError::PageFetch(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let invalid: PipelineError = ValidationError::UnsupportedScheme("ftp".into()).into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let missing = ExtractionError::ElementMissing {
            element_id: "downloadButton".into(),
        };
        let not_found = PipelineError::from_first_resolution(missing.clone().into());
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let page = PipelineError::from_first_resolution(ResolveError::Status(StatusCode::BAD_GATEWAY));
        assert_eq!(page.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let gone = PipelineError::LinkExhausted(missing.into());
        assert_eq!(gone.status_code(), StatusCode::GONE);
    }
}

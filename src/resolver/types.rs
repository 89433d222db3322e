// 解析模块类型定义

use reqwest::{StatusCode, Url};
use std::fmt;
use thiserror::Error;

/// 分享页链接
///
/// 原样保存调用方传入的字符串作为缓存 key，不做任何规范化
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceUrl {
    raw: String,
    url: Url,
}

impl SourceUrl {
    /// 校验并构造分享页链接（仅接受 http/https）
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let url = Url::parse(raw).map_err(|e| ValidationError::Malformed {
            input: raw.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(Self {
                raw: raw.to_string(),
                url,
            }),
            other => Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
    }

    /// 原始字符串（缓存 key）
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// 路径最后一个非空片段，用于推导文件名
    pub fn last_path_segment(&self) -> Option<String> {
        self.url
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(|s| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// 直链（指向实际文件字节，上游会定期让其失效）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectLink(String);

impl DirectLink {
    pub fn new(link: impl Into<String>) -> Self {
        Self(link.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DirectLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 分享链接校验错误（不会发起任何网络请求）
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("无效的链接 {input}: {reason}")]
    Malformed { input: String, reason: String },
    #[error("不支持的协议: {0}（仅支持 http/https）")]
    UnsupportedScheme(String),
}

/// 分享页已取回，但无法提取直链
///
/// 文件被删除或设为私有时页面上不再有下载按钮，属于预期情况
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("页面中不存在元素 #{element_id}")]
    ElementMissing { element_id: String },
    #[error("元素 #{element_id} 缺少属性 {attribute}")]
    AttributeMissing { element_id: String, attribute: String },
    #[error("元素 #{element_id} 的属性 {attribute} 为空")]
    AttributeEmpty { element_id: String, attribute: String },
    #[error("提取到的直链无效: {0}")]
    InvalidLink(String),
}

/// 分享页解析失败
#[derive(Debug, Error)]
pub enum ResolveError {
    /// 网络层失败（连接、超时、读取响应体等）
    #[error("请求分享页面失败: {0}")]
    Network(#[from] reqwest::Error),
    /// 分享页返回非成功状态码
    #[error("分享页面返回异常状态码: {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl ResolveError {
    /// 是否为“页面正常但找不到直链”
    pub fn is_extraction(&self) -> bool {
        matches!(self, ResolveError::Extraction(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_url_accepts_http_and_https() {
        assert!(SourceUrl::parse("http://example.com/a").is_ok());
        assert!(SourceUrl::parse("https://example.com/a").is_ok());
    }

    #[test]
    fn test_source_url_rejects_other_schemes() {
        assert_eq!(
            SourceUrl::parse("ftp://example.com/x"),
            Err(ValidationError::UnsupportedScheme("ftp".to_string()))
        );
        assert!(matches!(
            SourceUrl::parse("not a url"),
            Err(ValidationError::Malformed { .. })
        ));
    }

    #[test]
    fn test_source_url_keeps_raw_string() {
        // Url 会补全末尾斜杠，缓存 key 必须保持原样
        let source = SourceUrl::parse("https://Example.com").unwrap();
        assert_eq!(source.as_str(), "https://Example.com");
        assert_ne!(
            SourceUrl::parse("https://example.com/a/").unwrap().as_str(),
            SourceUrl::parse("https://example.com/a").unwrap().as_str()
        );
    }

    #[test]
    fn test_last_path_segment() {
        let source = SourceUrl::parse("https://host/file/abc/My%20Movie.mp4/").unwrap();
        assert_eq!(source.last_path_segment().as_deref(), Some("My Movie.mp4"));

        let root = SourceUrl::parse("https://host/").unwrap();
        assert_eq!(root.last_path_segment(), None);
    }

    #[test]
    fn test_last_path_segment_keeps_undecodable_segment() {
        // %FF 不是合法 UTF-8，保留原文
        let source = SourceUrl::parse("https://host/file/clip%FF.mp4").unwrap();
        assert_eq!(source.last_path_segment().as_deref(), Some("clip%FF.mp4"));
    }
}

//! Content-Disposition 生成与解析

use crate::config::FilenameStrategy;
use crate::resolver::SourceUrl;
use axum::http::HeaderValue;
use serde::Deserialize;
use std::fmt;

/// 展示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispositionMode {
    /// 浏览器/播放器内直接播放
    #[default]
    Inline,
    /// 下载保存
    Attachment,
}

impl DispositionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispositionMode::Inline => "inline",
            DispositionMode::Attachment => "attachment",
        }
    }
}

impl fmt::Display for DispositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 按策略确定最终文件名
///
/// 顺序：调用方指定 → 上游响应头 → 分享链接末段 → 兜底名，策略决定哪些来源参与
pub fn choose_filename(
    strategy: FilenameStrategy,
    filename_override: Option<&str>,
    upstream_disposition: Option<&str>,
    source: &SourceUrl,
    fallback: &str,
) -> String {
    let explicit = filename_override
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let from_upstream = || {
        upstream_disposition
            .and_then(parse_disposition_filename)
            .filter(|s| !s.is_empty())
    };
    let from_url = || source.last_path_segment().filter(|s| !s.is_empty());

    let chosen = match strategy {
        FilenameStrategy::Upstream => explicit.or_else(from_upstream).or_else(from_url),
        FilenameStrategy::DerivedFromUrl => explicit.or_else(from_url),
        FilenameStrategy::Override => explicit,
    };

    chosen.unwrap_or_else(|| fallback.to_string())
}

/// 生成 `<mode>; filename="<name>"`
///
/// 引号内只保留可见 ASCII，非 ASCII 文件名额外附带 RFC 5987 的 `filename*`
pub fn build_disposition(mode: DispositionMode, filename: &str) -> HeaderValue {
    let ascii: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();

    let value = if ascii.as_str() == filename {
        format!("{}; filename=\"{}\"", mode, ascii)
    } else {
        format!(
            "{}; filename=\"{}\"; filename*=UTF-8''{}",
            mode,
            ascii,
            urlencoding::encode(filename)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// 从上游 Content-Disposition 中取文件名，`filename*` 优先
pub fn parse_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in split_params(header_value) {
        let Some((name, value)) = param.trim().split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        if name == "filename*" {
            // charset'lang'percent-encoded
            let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                if !decoded.is_empty() {
                    return Some(decoded.into_owned());
                }
            }
        } else if name == "filename" {
            let unquoted = unquote(value);
            if !unquoted.is_empty() {
                plain = Some(unquoted);
            }
        }
    }

    plain
}

/// 按 `;` 切分参数，引号内的 `;` 不切分
fn split_params(header_value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in header_value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&header_value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&header_value[start..]);
    params
}

/// 去掉外层引号并还原 `\"` 与 `\\`
fn unquote(value: &str) -> String {
    let inner = match value.strip_prefix('"') {
        Some(rest) => rest.strip_suffix('"').unwrap_or(rest),
        None => return value.to_string(),
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

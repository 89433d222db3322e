// 接口错误

use crate::pipeline::PipelineError;
use crate::proxy::apply_cors_headers;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// 接口错误，统一转换为纯文本响应（播放器/下载器直接展示）
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// 路径中的 base64 无法解码
    #[error("无效的链接编码: {0}")]
    InvalidEncoding(String),
    /// 查询参数缺失或格式错误
    #[error("无效的查询参数: {0}")]
    InvalidQuery(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(e) => e.status_code(),
            ApiError::InvalidEncoding(_) | ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        } else {
            tracing::warn!("请求被拒绝: status={}, {}", status, self);
        }

        let mut response = (status, self.to_string()).into_response();
        apply_cors_headers(response.headers_mut());
        response
    }
}

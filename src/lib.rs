// Share Link Proxy Library
// 分享页直链解析 + 缓存 + 流式代理

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 分享页解析模块
pub mod resolver;

// 直链缓存模块
pub mod cache;

// 文件代理模块
pub mod proxy;

// 解析-缓存-转发流水线
pub mod pipeline;

// Web服务器模块
pub mod server;

// 公共模块
pub mod common;

// 导出常用类型
pub use cache::LinkCache;
pub use config::AppConfig;
pub use pipeline::{LinkPipeline, PipelineError, ProxyRequest, StreamOutcome};
pub use proxy::{DispositionMode, ProxyStreamer};
pub use resolver::{DirectLink, HtmlShareResolver, ResolveError, ShareResolver, SourceUrl};
pub use server::{build_router, AppState};

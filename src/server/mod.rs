// Web服务器模块

pub mod error;
pub mod handlers;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// 构建完整路由
pub fn build_router(state: AppState) -> Router {
    // 单个请求内的 panic 转为 500，不影响其他请求
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/view/*encoded", get(handlers::view).options(handlers::preflight))
        .route("/down/*encoded", get(handlers::down).options(handlers::preflight))
        .route("/stream", get(handlers::stream).options(handlers::preflight))
        .with_state(state)
        .layer(middleware)
}

//! 公共模块
//!
//! 提供跨模块使用的通用组件

mod single_flight;

pub use single_flight::{FlightGuard, SingleFlight};

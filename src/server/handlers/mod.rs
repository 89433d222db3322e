// API处理器模块

pub mod index;
pub mod stream;

pub use index::{health_check, index};
pub use stream::{down, preflight, stream, view};

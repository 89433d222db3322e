// 文件代理模块

pub mod disposition;
pub mod streamer;

pub use disposition::{build_disposition, choose_filename, parse_disposition_filename, DispositionMode};
pub use streamer::{apply_cors_headers, ProxyStreamer, ResponseMeta, UpstreamFile};

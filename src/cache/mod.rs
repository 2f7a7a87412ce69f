// 缓存模块
// 负责缓存键派生和推理响应的读写

pub mod keys;
pub mod models;
pub mod service;

pub use models::CachedResponse;
pub use service::ResponseCache;

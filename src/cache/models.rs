use serde::{Deserialize, Serialize};

/// 推理响应缓存条目
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CachedResponse {
    pub output: String,
    pub tokens_used: u32,
    pub model_version: String,
    /// 写入时间，Unix 时间戳
    pub cached_at: i64,
}

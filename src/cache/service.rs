use std::sync::Arc;
use std::time::Duration;

use crate::cache::keys;
use crate::cache::models::CachedResponse;
use crate::metrics::GatewayMetrics;
use crate::model::{InferenceRequest, InferenceResponse};
use crate::store::{Store, StoreError};

/// 推理响应缓存
///
/// 通过共享存储读写序列化后的响应。默认配置下存储故障降级为未命中，
/// 缓存只影响性能，不成为服务路径的依赖。
pub struct ResponseCache {
    store: Arc<dyn Store>,
    ttl: Duration,
    fail_closed: bool,
    metrics: Arc<GatewayMetrics>,
}

impl ResponseCache {
    pub fn new(
        store: Arc<dyn Store>,
        ttl: Duration,
        fail_closed: bool,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            store,
            ttl,
            fail_closed,
            metrics,
        }
    }

    /// 根据请求内容派生缓存键
    pub fn fingerprint(&self, request: &InferenceRequest) -> String {
        keys::inference_key(request)
    }

    /// 读取缓存
    ///
    /// 未命中和反序列化失败都返回 None，损坏的条目等着被下次写入覆盖。
    /// 存储不可用时默认同样返回 None，只有配置为 fail-closed 才上抛错误。
    /// 每次调用恰好累加一次命中或未命中计数。
    pub async fn get(&self, key: &str) -> Result<Option<InferenceResponse>, StoreError> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.metrics.record_cache_miss();
                return Ok(None);
            }
            Err(e) => {
                self.metrics.record_cache_miss();
                if self.fail_closed {
                    return Err(e);
                }
                tracing::warn!("Cache read failed, treating as miss: {}", e);
                return Ok(None);
            }
        };

        match serde_json::from_str::<CachedResponse>(&raw) {
            Ok(cached) => {
                self.metrics.record_cache_hit();
                tracing::debug!("Cache hit for key: {}", &key[..key.len().min(20)]);
                Ok(Some(InferenceResponse {
                    output: cached.output,
                    tokens_used: cached.tokens_used,
                    model_version: cached.model_version,
                }))
            }
            Err(e) => {
                self.metrics.record_cache_miss();
                tracing::warn!("Discarding corrupt cache entry: {}", e);
                Ok(None)
            }
        }
    }

    /// 写入缓存，尽力而为，失败只记日志不上抛
    pub async fn put(&self, key: &str, response: &InferenceResponse) {
        let entry = CachedResponse {
            output: response.output.clone(),
            tokens_used: response.tokens_used,
            model_version: response.model_version.clone(),
            cached_at: chrono::Utc::now().timestamp(),
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set_with_ttl(key, &json, self.ttl).await {
            tracing::warn!("Cache write failed: {}", e);
        } else {
            tracing::debug!(
                "Cached response for key: {} (TTL: {}s)",
                &key[..key.len().min(20)],
                self.ttl.as_secs()
            );
        }
    }
}

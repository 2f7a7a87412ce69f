use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::ResponseCache;
use crate::limiter::{RateLimitDecision, RateLimiter};
use crate::metrics::GatewayMetrics;
use crate::model::{InferenceRequest, InferenceResponse, ModelBackend};

/// 单次请求的处理结果
#[derive(Debug)]
pub struct ServeOutcome {
    pub response: InferenceResponse,
    pub cache_hit: bool,
}

/// 请求处理失败
#[derive(Debug)]
pub enum ServeError {
    /// 客户端超出限流配额
    RateLimited { retry_after_secs: u64 },
    /// 缓存配置为 fail-closed 且存储不可用
    StoreUnavailable(String),
    /// 模型计算失败，此时不写缓存
    Backend(String),
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::RateLimited { retry_after_secs } => {
                write!(f, "rate limited, retry after {}s", retry_after_secs)
            }
            ServeError::StoreUnavailable(msg) => write!(f, "store unavailable: {}", msg),
            ServeError::Backend(msg) => write!(f, "backend failed: {}", msg),
        }
    }
}

/// 推理服务编排
///
/// 每个请求按 限流检查 -> 缓存查找 -> 模型计算 -> 缓存写入 推进：
/// 拒绝的请求不会触发任何缓存或模型调用，命中的请求不会触发模型调用，
/// 只有计算成功的结果才会写入缓存。
pub struct InferenceService {
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    model: Arc<dyn ModelBackend>,
    metrics: Arc<GatewayMetrics>,
}

impl InferenceService {
    pub fn new(
        cache: Arc<ResponseCache>,
        limiter: Arc<RateLimiter>,
        model: Arc<dyn ModelBackend>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            cache,
            limiter,
            model,
            metrics,
        }
    }

    pub async fn serve(
        &self,
        client_key: &str,
        request: &InferenceRequest,
    ) -> Result<ServeOutcome, ServeError> {
        let started = Instant::now();
        self.metrics.record_request();

        let result = self.serve_inner(client_key, request).await;

        if matches!(result, Err(ServeError::RateLimited { .. })) {
            self.metrics.record_denied();
        }
        self.metrics.observe_latency(started.elapsed());
        result
    }

    async fn serve_inner(
        &self,
        client_key: &str,
        request: &InferenceRequest,
    ) -> Result<ServeOutcome, ServeError> {
        if let RateLimitDecision::Denied { retry_after_secs } =
            self.limiter.admit(client_key).await
        {
            return Err(ServeError::RateLimited { retry_after_secs });
        }

        let key = self.cache.fingerprint(request);
        match self.cache.get(&key).await {
            Ok(Some(response)) => {
                return Ok(ServeOutcome {
                    response,
                    cache_hit: true,
                });
            }
            Ok(None) => {}
            Err(e) => return Err(ServeError::StoreUnavailable(e.to_string())),
        }

        let response = self
            .model
            .predict(request)
            .await
            .map_err(|e| ServeError::Backend(e.to_string()))?;

        // 计算成功后写缓存，调用方是否还在等待不影响这一步
        self.cache.put(&key, &response).await;

        Ok(ServeOutcome {
            response,
            cache_hit: false,
        })
    }
}

use std::sync::Arc;
use std::time::Duration;

use crate::store::{Store, StoreError};

/// 限流计数键前缀，与缓存键共用同一个存储实例的不同命名空间
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 限流判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Denied { retry_after_secs: u64 },
}

/// 固定窗口限流器
///
/// 每个客户端一个计数器，窗口从该客户端首次请求时开始计时，
/// 由存储的 TTL 负责过期，不同客户端的窗口互相错开。
/// 被拒绝的请求同样计数，窗口内超限后不会因为重试而恢复。
pub struct RateLimiter {
    store: Arc<dyn Store>,
    limit: u32,
    window: Duration,
    enabled: bool,
    fail_closed: bool,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn Store>,
        limit: u32,
        window: Duration,
        enabled: bool,
        fail_closed: bool,
    ) -> Self {
        Self {
            store,
            limit,
            window,
            enabled,
            fail_closed,
        }
    }

    /// 判定是否放行该客户端的本次请求
    pub async fn admit(&self, client_key: &str) -> RateLimitDecision {
        // 限流关闭时直接放行，不触碰存储
        if !self.enabled {
            return RateLimitDecision::Allowed;
        }

        let window_key = format!("{}{}", RATE_LIMIT_PREFIX, client_key);
        match self
            .store
            .increment_with_ttl_if_absent(&window_key, self.window)
            .await
        {
            Ok(count) if count <= u64::from(self.limit) => RateLimitDecision::Allowed,
            Ok(count) => {
                tracing::debug!(
                    "Rate limit exceeded for {}: {} of {}",
                    client_key,
                    count,
                    self.limit
                );
                RateLimitDecision::Denied {
                    retry_after_secs: self.window.as_secs(),
                }
            }
            Err(StoreError::Unavailable(msg)) => {
                if self.fail_closed {
                    tracing::warn!("Store unreachable, denying request: {}", msg);
                    RateLimitDecision::Denied {
                        retry_after_secs: self.window.as_secs(),
                    }
                } else {
                    tracing::warn!("Store unreachable, allowing request: {}", msg);
                    RateLimitDecision::Allowed
                }
            }
        }
    }
}

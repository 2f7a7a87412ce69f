use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// 端到端延迟直方图的桶上界（毫秒）
const LATENCY_BUCKETS_MS: [u64; 12] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000, 10000];

/// 网关运行指标
///
/// 全部是单调计数器，由缓存、限流和编排各自写入，
/// 导出格式由 /metrics 路由决定，这里只负责计数。
#[derive(Default)]
pub struct GatewayMetrics {
    requests_total: AtomicU64,
    requests_denied_total: AtomicU64,
    cache_hits_total: AtomicU64,
    cache_misses_total: AtomicU64,
    latency_buckets: [AtomicU64; 13],
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.requests_denied_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        let index = LATENCY_BUCKETS_MS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.latency_buckets[index].fetch_add(1, Ordering::Relaxed);
        self.latency_sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut cumulative = 0;
        let mut buckets = Vec::with_capacity(LATENCY_BUCKETS_MS.len());
        for (index, &bound) in LATENCY_BUCKETS_MS.iter().enumerate() {
            cumulative += self.latency_buckets[index].load(Ordering::Relaxed);
            buckets.push(LatencyBucket {
                le_ms: bound,
                count: cumulative,
            });
        }

        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_denied_total: self.requests_denied_total.load(Ordering::Relaxed),
            cache_hits_total: self.cache_hits_total.load(Ordering::Relaxed),
            cache_misses_total: self.cache_misses_total.load(Ordering::Relaxed),
            request_latency: LatencySnapshot {
                buckets,
                sum_ms: self.latency_sum_ms.load(Ordering::Relaxed),
                count: self.latency_count.load(Ordering::Relaxed),
            },
        }
    }
}

/// 某一时刻的指标快照
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_denied_total: u64,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub request_latency: LatencySnapshot,
}

/// 延迟直方图快照，桶计数为累积值
#[derive(Debug, Serialize)]
pub struct LatencySnapshot {
    pub buckets: Vec<LatencyBucket>,
    pub sum_ms: u64,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct LatencyBucket {
    pub le_ms: u64,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = GatewayMetrics::new();

        metrics.record_request();
        metrics.record_request();
        metrics.record_denied();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.requests_denied_total, 1);
        assert_eq!(snapshot.cache_hits_total, 1);
        assert_eq!(snapshot.cache_misses_total, 1);
    }

    #[test]
    fn latency_buckets_are_cumulative() {
        let metrics = GatewayMetrics::new();

        metrics.observe_latency(Duration::from_millis(3));
        metrics.observe_latency(Duration::from_millis(80));
        metrics.observe_latency(Duration::from_secs(20));

        let latency = metrics.snapshot().request_latency;
        assert_eq!(latency.count, 3);

        let le_100 = latency.buckets.iter().find(|b| b.le_ms == 100).unwrap();
        assert_eq!(le_100.count, 2);
        // 超出最大桶的观测只进入总数
        let last = latency.buckets.last().unwrap();
        assert_eq!(last.count, 2);
    }
}

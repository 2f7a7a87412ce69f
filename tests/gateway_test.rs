use std::sync::Arc;
use std::time::Duration;

use inference_gateway::cache::ResponseCache;
use inference_gateway::config::Config;
use inference_gateway::limiter::RateLimiter;
use inference_gateway::metrics::GatewayMetrics;
use inference_gateway::model::{InferenceRequest, ModelBackend, PlaceholderModel};
use inference_gateway::serving::{InferenceService, ServeError};
use inference_gateway::store::{MemoryStore, Store};

fn test_config() -> Config {
    Config {
        redis_url: "redis://127.0.0.1:6379/0".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 3000,
        api_base_uri: "/api/v1".to_string(),
        store_timeout_ms: 500,
        cache_ttl_secs: 60,
        cache_fail_closed: false,
        rate_limit_enabled: true,
        rate_limit_window_secs: 60,
        rate_limit_requests: 10,
        rate_limit_fail_closed: false,
        model_name: "default-model".to_string(),
        model_version: "1.0.0".to_string(),
        model_max_tokens: 1000,
        model_temperature: 0.7,
    }
}

fn build_service(
    store: Arc<MemoryStore>,
    config: &Config,
) -> (Arc<InferenceService>, Arc<GatewayMetrics>) {
    let metrics = Arc::new(GatewayMetrics::new());
    let model: Arc<dyn ModelBackend> = Arc::new(PlaceholderModel::new(config));
    let cache = Arc::new(ResponseCache::new(
        store.clone(),
        config.cache_ttl(),
        config.cache_fail_closed,
        metrics.clone(),
    ));
    let limiter = Arc::new(RateLimiter::new(
        store,
        config.rate_limit_requests,
        config.rate_limit_window(),
        config.rate_limit_enabled,
        config.rate_limit_fail_closed,
    ));
    (
        Arc::new(InferenceService::new(cache, limiter, model, metrics.clone())),
        metrics,
    )
}

fn sample_request(prompt: &str) -> InferenceRequest {
    InferenceRequest {
        prompt: prompt.to_string(),
        max_tokens: 100,
        temperature: 0.7,
    }
}

#[tokio::test(start_paused = true)]
async fn window_of_ten_then_denial_then_fresh_window() {
    let store = Arc::new(MemoryStore::new());
    let (service, metrics) = build_service(store.clone(), &test_config());

    // 前 10 个请求全部放行
    for i in 0..10 {
        let result = service
            .serve("1.2.3.4", &sample_request(&format!("prompt {}", i)))
            .await;
        assert!(result.is_ok(), "request {} should be allowed", i + 1);
    }

    // 同一窗口内第 11 个被拒绝，计数不回退
    let result = service.serve("1.2.3.4", &sample_request("prompt 11")).await;
    assert!(matches!(result, Err(ServeError::RateLimited { .. })));
    assert_eq!(
        store.get("rate_limit:1.2.3.4").await.unwrap().as_deref(),
        Some("11")
    );

    // 窗口过期后重新从 1 开始计数
    tokio::time::sleep(Duration::from_secs(61)).await;
    let result = service.serve("1.2.3.4", &sample_request("prompt 12")).await;
    assert!(result.is_ok());
    assert_eq!(
        store.get("rate_limit:1.2.3.4").await.unwrap().as_deref(),
        Some("1")
    );

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.requests_total, 12);
    assert_eq!(snapshot.requests_denied_total, 1);
}

#[tokio::test(start_paused = true)]
async fn same_fields_in_different_order_hit_the_cache() {
    let store = Arc::new(MemoryStore::new());
    let (service, metrics) = build_service(store, &test_config());

    let first: InferenceRequest = serde_json::from_str(
        r#"{"prompt": "X", "max_tokens": 100, "temperature": 0.7}"#,
    )
    .unwrap();
    let second: InferenceRequest = serde_json::from_str(
        r#"{"temperature": 0.7, "prompt": "X", "max_tokens": 100}"#,
    )
    .unwrap();

    let miss = service.serve("1.2.3.4", &first).await.unwrap();
    assert!(!miss.cache_hit);

    let hit = service.serve("1.2.3.4", &second).await.unwrap();
    assert!(hit.cache_hit);
    assert_eq!(hit.response.output, miss.response.output);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.cache_hits_total, 1);
    assert_eq!(snapshot.cache_misses_total, 1);
}

#[tokio::test(start_paused = true)]
async fn cached_response_expires_with_the_ttl() {
    let store = Arc::new(MemoryStore::new());
    let config = Config {
        rate_limit_requests: 100,
        ..test_config()
    };
    let (service, _) = build_service(store, &config);

    let miss = service.serve("1.2.3.4", &sample_request("X")).await.unwrap();
    assert!(!miss.cache_hit);

    tokio::time::sleep(Duration::from_secs(61)).await;

    let after = service.serve("1.2.3.4", &sample_request("X")).await.unwrap();
    assert!(!after.cache_hit);
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_requests_share_one_counter() {
    let store = Arc::new(MemoryStore::new());
    let config = Config {
        rate_limit_requests: 100,
        ..test_config()
    };
    let (service, _) = build_service(store.clone(), &config);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .serve("9.9.9.9", &sample_request(&format!("prompt {}", i)))
                    .await
            })
        })
        .collect();

    for handle in futures_util::future::join_all(handles).await {
        assert!(handle.unwrap().is_ok());
    }

    // 并发首请求没有丢失任何一次计数
    assert_eq!(
        store.get("rate_limit:9.9.9.9").await.unwrap().as_deref(),
        Some("8")
    );
}

#[tokio::test(start_paused = true)]
async fn disabled_limiter_admits_unlimited_requests() {
    let store = Arc::new(MemoryStore::new());
    let config = Config {
        rate_limit_enabled: false,
        rate_limit_requests: 1,
        ..test_config()
    };
    let (service, _) = build_service(store.clone(), &config);

    for i in 0..20 {
        let result = service
            .serve("1.2.3.4", &sample_request(&format!("prompt {}", i)))
            .await;
        assert!(result.is_ok());
    }

    // 限流关闭时不创建任何计数器
    assert!(store.get("rate_limit:1.2.3.4").await.unwrap().is_none());
}

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use inference_gateway::{
    AppState,
    cache::ResponseCache,
    config::Config,
    limiter::RateLimiter,
    metrics::GatewayMetrics,
    middleware::log_errors,
    model::{ModelBackend, PlaceholderModel},
    routes,
    serving::InferenceService,
    store::RedisStore,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置共享存储，缓存和限流都通过它访问同一个 Redis
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let store = Arc::new(RedisStore::new(
        Arc::new(redis_client),
        config.store_timeout(),
    ));

    // 启动时探测存储连通性，失败时降级运行而不是退出
    match store.ping().await {
        Ok(()) => tracing::info!("Connected to store at {}", config.redis_url),
        Err(e) => tracing::warn!("Store unreachable at startup, serving degraded: {}", e),
    }

    // 组装各服务
    let metrics = Arc::new(GatewayMetrics::new());
    let model: Arc<dyn ModelBackend> = Arc::new(PlaceholderModel::new(&config));
    let cache = Arc::new(ResponseCache::new(
        store.clone(),
        config.cache_ttl(),
        config.cache_fail_closed,
        metrics.clone(),
    ));
    let limiter = Arc::new(RateLimiter::new(
        store.clone(),
        config.rate_limit_requests,
        config.rate_limit_window(),
        config.rate_limit_enabled,
        config.rate_limit_fail_closed,
    ));
    let service = Arc::new(InferenceService::new(
        cache,
        limiter,
        model.clone(),
        metrics.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        service,
        model,
        metrics,
    };

    // API 路由
    let api_routes = Router::new()
        .route("/infer", post(routes::infer::infer))
        .route("/model", get(routes::infer::model_info));

    let router = Router::new()
        .nest(&config.api_base_uri.clone(), api_routes)
        .route("/", get(routes::system::root))
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics));

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");
}

// 等待停机信号，在途请求连同其存储调用一起收尾
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install ctrl-c handler");
    tracing::info!("Shutdown signal received");
}

use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;

/// 服务信息
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "inference-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// 存活探针
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// 指标快照，具体导出格式在这里决定，核心组件只负责计数
#[axum::debug_handler]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

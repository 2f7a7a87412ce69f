use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Json, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{
    AppState,
    model::InferenceRequest,
    serving::ServeError,
    utils::{error_codes, error_to_api_response, success_to_api_response},
};

/// 校验请求参数，不合法的请求在进入限流计数之前被拒绝
fn validate_request(req: &InferenceRequest, max_tokens_limit: u32) -> Result<(), String> {
    if req.prompt.is_empty() {
        return Err("prompt 不能为空".to_string());
    }
    if req.max_tokens < 1 || req.max_tokens > max_tokens_limit {
        return Err(format!("max_tokens 必须在 1 到 {} 之间", max_tokens_limit));
    }
    if !(0.0..=2.0).contains(&req.temperature) {
        return Err("temperature 必须在 0.0 到 2.0 之间".to_string());
    }
    Ok(())
}

/// 从请求头或连接信息推导客户端标识
fn client_identity(headers: &HeaderMap, remote: Option<&SocketAddr>) -> String {
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .map(|s| s.trim().to_string())
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[axum::debug_handler]
pub async fn infer(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<InferenceRequest>,
) -> impl IntoResponse {
    if let Err(msg) = validate_request(&req, state.config.model_max_tokens) {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(error_codes::VALIDATION_ERROR, msg),
        );
    }

    let client_key = client_identity(&headers, Some(&remote));
    let request_id = uuid::Uuid::new_v4();
    tracing::info!(
        "Inference request {} from {} (prompt length: {})",
        request_id,
        client_key,
        req.prompt.len()
    );

    match state.service.serve(&client_key, &req).await {
        Ok(outcome) => {
            tracing::info!(
                "Inference request {} served (cache {})",
                request_id,
                if outcome.cache_hit { "hit" } else { "miss" }
            );
            (StatusCode::OK, success_to_api_response(outcome.response))
        }
        Err(ServeError::RateLimited { retry_after_secs }) => (
            StatusCode::TOO_MANY_REQUESTS,
            error_to_api_response(
                error_codes::RATE_LIMIT,
                format!("请求过于频繁，请在{}秒后重试", retry_after_secs),
            ),
        ),
        Err(ServeError::StoreUnavailable(msg)) => {
            tracing::error!("Inference request {} aborted, store down: {}", request_id, msg);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                error_to_api_response(
                    error_codes::STORE_UNAVAILABLE,
                    "缓存存储暂时不可用".to_string(),
                ),
            )
        }
        Err(ServeError::Backend(msg)) => {
            tracing::error!("Inference request {} failed in model: {}", request_id, msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "模型计算失败".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn model_info(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, success_to_api_response(state.model.info()))
}

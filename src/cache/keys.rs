use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::InferenceRequest;

/// 推理响应缓存键前缀
const INFERENCE_PREFIX: &str = "inference:";

/// 参与指纹计算的规范化字段
///
/// 字段按固定顺序序列化，输入 JSON 的字段顺序不影响结果，
/// 数值格式由 serde_json 统一，不受地域设置影响。
#[derive(Serialize)]
struct CanonicalRequest<'a> {
    max_tokens: u32,
    prompt: &'a str,
    temperature: f64,
}

/// 根据请求的缓存相关字段生成确定性缓存键
///
/// 相同参数的请求生成相同的键，任一参数不同时键不同。
pub fn inference_key(request: &InferenceRequest) -> String {
    let canonical = CanonicalRequest {
        max_tokens: request.max_tokens,
        prompt: &request.prompt,
        temperature: request.temperature,
    };
    let payload =
        serde_json::to_string(&canonical).expect("canonical request always serializes");

    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{}{:x}", INFERENCE_PREFIX, hasher.finalize())
}

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;

fn default_max_tokens() -> u32 {
    100
}

fn default_temperature() -> f64 {
    0.7
}

/// 推理请求
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceRequest {
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

/// 推理响应
#[derive(Debug, Clone, Serialize)]
pub struct InferenceResponse {
    pub output: String,
    pub tokens_used: u32,
    pub model_version: String,
}

/// 模型元信息
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub model_version: String,
    pub status: String,
    pub description: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// 模型计算失败
#[derive(Debug)]
pub struct ModelError(pub String);

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model computation failed: {}", self.0)
    }
}

impl std::error::Error for ModelError {}

/// 推理后端抽象
///
/// 对编排层来说是一个不透明、可能较慢的计算，
/// 失败与存储故障严格区分，由调用方原样上抛。
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn info(&self) -> ModelInfo;

    async fn predict(&self, request: &InferenceRequest)
    -> Result<InferenceResponse, ModelError>;
}

/// 占位模型实现
///
/// 模拟真实模型的处理延迟和 token 消耗，接入真实模型时替换这个实现即可。
pub struct PlaceholderModel {
    name: String,
    version: String,
    max_tokens: u32,
    temperature: f64,
}

impl PlaceholderModel {
    pub fn new(config: &Config) -> Self {
        Self {
            name: config.model_name.clone(),
            version: config.model_version.clone(),
            max_tokens: config.model_max_tokens,
            temperature: config.model_temperature,
        }
    }
}

#[async_trait]
impl ModelBackend for PlaceholderModel {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            model_name: self.name.clone(),
            model_version: self.version.clone(),
            status: "ready".to_string(),
            description: format!("Placeholder model - {} v{}", self.name, self.version),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    async fn predict(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, ModelError> {
        // 模拟模型处理耗时
        tokio::time::sleep(Duration::from_millis(100)).await;

        // 粗略按 4 个字符一个 token 估算
        let estimated_tokens = (request.prompt.len() / 4) as u32;
        let generated_tokens = request.max_tokens.min(estimated_tokens + 10);
        let tokens_used = estimated_tokens + generated_tokens;

        let preview: String = request.prompt.chars().take(100).collect();
        let ellipsis = if request.prompt.chars().count() > 100 {
            "..."
        } else {
            ""
        };
        let output = format!(
            "Model response to: {}{}\n\n[Placeholder output: {} v{}, tokens ~{}, temperature {}]",
            preview, ellipsis, self.name, self.version, tokens_used, request.temperature
        );

        Ok(InferenceResponse {
            output,
            tokens_used,
            model_version: self.version.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[tokio::test(start_paused = true)]
    async fn predict_reports_version_and_tokens() {
        let model = PlaceholderModel::new(&test_config());
        let request = InferenceRequest {
            prompt: "What is artificial intelligence?".to_string(),
            max_tokens: 50,
            temperature: 0.7,
        };

        let response = model.predict(&request).await.unwrap();
        assert_eq!(response.model_version, "1.0.0");
        assert!(response.tokens_used > 0);
        assert!(response.output.contains("What is artificial intelligence?"));
    }

    #[test]
    fn request_defaults_apply_when_fields_omitted() {
        let request: InferenceRequest =
            serde_json::from_str(r#"{"prompt": "hello"}"#).unwrap();
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.temperature, 0.7);
    }

    #[test]
    fn info_describes_the_model() {
        let model = PlaceholderModel::new(&test_config());
        let info = model.info();
        assert_eq!(info.model_name, "default-model");
        assert_eq!(info.status, "ready");
        assert_eq!(info.max_tokens, 1000);
    }
}

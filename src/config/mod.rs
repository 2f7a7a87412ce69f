use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub store_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_fail_closed: bool,
    pub rate_limit_enabled: bool,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_fail_closed: bool,
    pub model_name: String,
    pub model_version: String,
    pub model_max_tokens: u32,
    pub model_temperature: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api/v1".to_string()),
            store_timeout_ms: parse_or("STORE_TIMEOUT_MS", 500),
            cache_ttl_secs: parse_or("CACHE_TTL", 60),
            cache_fail_closed: parse_or("CACHE_FAIL_CLOSED", false),
            rate_limit_enabled: parse_or("RATE_LIMIT_ENABLED", true),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 10),
            rate_limit_fail_closed: parse_or("RATE_LIMIT_FAIL_CLOSED", false),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| "default-model".to_string()),
            model_version: env::var("MODEL_VERSION").unwrap_or_else(|_| "1.0.0".to_string()),
            model_max_tokens: parse_or("MODEL_MAX_TOKENS", 1000),
            model_temperature: parse_or("MODEL_TEMPERATURE", 0.7),
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

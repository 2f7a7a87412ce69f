use std::sync::Arc;

pub mod cache;
pub mod config;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod model;
pub mod routes;
pub mod serving;
pub mod store;
pub mod utils;

use config::Config;
use metrics::GatewayMetrics;
use model::ModelBackend;
use serving::InferenceService;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub service: Arc<InferenceService>,
    pub model: Arc<dyn ModelBackend>,
    pub metrics: Arc<GatewayMetrics>,
}

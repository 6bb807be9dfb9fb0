pub mod config;
pub mod dispatcher;
pub mod downstream;
pub mod error;
pub mod handlers;
pub mod hook;
pub mod logging;
pub mod pipeline;
pub mod resolver;
pub mod schedule;

use axum::{Router, routing};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use config::RelayConfig;
use downstream::ReleaseApi;
use hook::HookFilter;
use pipeline::HookPipeline;
use schedule::Clock;

pub struct AppState {
    pub config: RelayConfig,
    pub filter: HookFilter,
    pub pipeline: HookPipeline,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: RelayConfig, api: Arc<dyn ReleaseApi>, clock: Arc<dyn Clock>) -> Self {
        Self {
            filter: HookFilter::from_config(&config),
            pipeline: HookPipeline::new(&config, api, clock),
            config,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(handlers::root))
        .route("/hook", routing::post(handlers::handle_hook))
        .with_state(state)
}

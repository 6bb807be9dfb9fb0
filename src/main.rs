use release_hook_relay::config::RelayConfig;
use release_hook_relay::downstream::HttpReleaseApi;
use release_hook_relay::error::RelayError;
use release_hook_relay::logging::setup_logging;
use release_hook_relay::schedule::SystemClock;
use release_hook_relay::{AppState, router};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match RelayConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: RelayConfig) -> Result<(), RelayError> {
    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = setup_logging(config.log_dir.clone())?;

    let api = Arc::new(HttpReleaseApi::from_config(&config)?);
    let bind_address = config.bind_address();

    info!(
        "Relaying hooks for {} (tag prefix '{}') to TaaS test '{}'",
        config.image_repo, config.image_tag_prefix, config.test_name
    );
    info!(
        "Validation: {}, ack: {}",
        config.validation.as_str(),
        config.ack.as_str()
    );

    let state = Arc::new(AppState::new(config, api, Arc::new(SystemClock)));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on {}...", bind_address);
    axum::serve(listener, app).await?;
    Ok(())
}

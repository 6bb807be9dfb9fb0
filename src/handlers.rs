//! HTTP handlers: the registry hook endpoint and a liveness probe.

use axum::{
    Json,
    body::Bytes,
    extract::Query,
    extract::State as AxumState,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use std::collections::HashMap;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::SharedState;
use crate::config::{AckMode, ValidationMode};
use crate::hook::{HookVerdict, Rejection};

/// Root health check endpoint
/// Supports ?format=json for detailed JSON response
pub async fn root(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if params.get("format").map(|s| s.as_str()) == Some("json") {
        Json(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": state.started_at,
            "uptime_seconds": state.start_time.elapsed().as_secs(),
            "image_repo": state.config.image_repo,
            "image_tag_prefix": state.config.image_tag_prefix,
            "test_name": state.config.test_name,
            "validation": state.config.validation.as_str(),
            "ack": state.config.ack.as_str(),
            "status": "healthy"
        }))
        .into_response()
    } else {
        concat!(env!("CARGO_PKG_NAME"), " - healthy").into_response()
    }
}

/// Handles the registry push hook.
///
/// Answers 400 only for a malformed payload in strict mode; every other
/// outcome, including downstream failures, is a 200.
pub async fn handle_hook(AxumState(state): AxumState<SharedState>, body: Bytes) -> StatusCode {
    info!("POST /hook");

    let tag = match state.filter.validate_body(&body) {
        HookVerdict::Accepted { tag, .. } => tag,
        HookVerdict::Rejected(Rejection::Malformed(_)) => {
            return match state.config.validation {
                ValidationMode::Strict => StatusCode::BAD_REQUEST,
                ValidationMode::Lenient => {
                    warn!("Lenient validation: acknowledging malformed hook without processing");
                    StatusCode::OK
                }
            };
        }
        HookVerdict::Rejected(_) => return StatusCode::OK,
    };

    let span = info_span!("hook", pipeline_id = %Uuid::now_v7(), tag = %tag);
    let pipeline = state.pipeline.clone();

    // The pipeline always runs in its own task so a disconnecting caller
    // cannot cancel it.
    let task = tokio::spawn(
        async move {
            pipeline.process(tag).await;
        }
        .instrument(span),
    );

    if state.config.ack == AckMode::AfterResolve {
        if let Err(e) = task.await {
            error!("Hook pipeline task failed: {}", e);
        }
    }

    StatusCode::OK
}

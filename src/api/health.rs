//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::config::EnvironmentChecks;

/// Liveness response
#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

/// Configuration report
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub environment_check: EnvironmentChecks,
    pub knowledge_base: bool,
}

/// Liveness probe - is the service running?
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "WhatsApp OpenAI bot is running",
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Configuration probe - are all required settings present?
async fn health(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<HealthResponse>) {
    let checks = state.config.environment_checks();
    let healthy = checks.all_ok();

    if !healthy {
        tracing::warn!(checks = ?checks, "health check found missing configuration");
    }

    let http_status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            environment: state.config.environment.clone(),
            environment_check: checks,
            knowledge_base: state.config.has_knowledge_base(),
        }),
    )
}

/// Build health router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
}

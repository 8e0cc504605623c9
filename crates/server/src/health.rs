use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use crate::api::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let active_sessions = state.orchestrator.store().len();

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "vaulta-server orchestrator initialized".to_string(),
        },
        active_sessions,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

//! Operator endpoints over the session store. Snapshots are already
//! sanitized: identity ids are hashed, PINs and history never leave the
//! store.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use vaulta_core::{ApplicationError, InterfaceError, ResetScope, SessionSnapshot};

use crate::api::{error_response, ApiError, AppState};

#[derive(Clone, Debug, Serialize)]
pub struct SessionList {
    pub count: usize,
    pub sessions: Vec<SessionSnapshot>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub reset_all: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResetResponse {
    pub cleared: usize,
}

pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionList> {
    let mut sessions = state.orchestrator.store().list();
    sessions.sort_by(|left, right| right.last_activity.cmp(&left.last_activity));
    Json(SessionList { count: sessions.len(), sessions })
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state.orchestrator.store().snapshot(&session_id).map(Json).ok_or_else(|| {
        error_response(
            ApplicationError::SessionNotFound(session_id).into_interface(Uuid::new_v4().to_string()),
        )
    })
}

pub async fn reset_sessions(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    let scope = match (request.session_id, request.reset_all) {
        (Some(session_id), false) if !session_id.trim().is_empty() => ResetScope::One(session_id),
        (None, true) => ResetScope::All,
        _ => {
            return Err(error_response(InterfaceError::BadRequest {
                message: "provide exactly one of session_id or reset_all".to_string(),
                correlation_id: Uuid::new_v4().to_string(),
            }))
        }
    };

    let cleared = state.orchestrator.store().reset(scope.clone());
    info!(
        event_name = "http.admin.reset",
        reset_all = matches!(scope, ResetScope::All),
        cleared,
        "sessions reset by operator"
    );
    Ok(Json(ResetResponse { cleared }))
}

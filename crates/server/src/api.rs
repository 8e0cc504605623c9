use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use vaulta_agent::TurnOrchestrator;
use vaulta_core::InterfaceError;

use crate::{admin, chat, health};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TurnOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
    pub correlation_id: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

/// Maps a layered interface error to a status code and a body that only
/// carries the user-safe message.
pub fn error_response(error: InterfaceError) -> ApiError {
    let (status, action) = match &error {
        InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, None),
        InterfaceError::Forbidden { action, .. } => (StatusCode::FORBIDDEN, Some(*action)),
        InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, None),
        InterfaceError::ServiceUnavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, None),
        InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };

    (
        status,
        Json(ErrorBody {
            error: error.error_code(),
            message: error.user_message(),
            action,
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat", post(chat::chat))
        .route("/api/sessions", get(admin::list_sessions))
        .route("/api/sessions/reset", post(admin::reset_sessions))
        .route("/api/sessions/{session_id}", get(admin::get_session))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use vaulta_agent::{Collaborators, DemoBank, OrchestratorSettings, TurnOrchestrator};
    use vaulta_core::SessionStore;

    use super::AppState;

    pub fn state() -> AppState {
        let orchestrator = TurnOrchestrator::new(
            SessionStore::new(Duration::from_secs(300), 10),
            Collaborators::demo_without_classifier(DemoBank::seeded()),
            OrchestratorSettings::default(),
        );
        AppState::new(Arc::new(orchestrator))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use vaulta_core::{hash_identity_id, InterfaceError};

    use super::{error_response, router, test_support};

    #[test]
    fn forbidden_carries_the_auth_action() {
        let (status, body) = error_response(InterfaceError::Forbidden {
            message: "verification required".to_string(),
            action: "request_auth",
            correlation_id: "req-1".to_string(),
        });

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "verification_required");
        assert_eq!(body.action, Some("request_auth"));
        assert_eq!(body.correlation_id, "req-1");
    }

    #[test]
    fn internal_errors_hide_their_message() {
        let (status, body) = error_response(InterfaceError::Internal {
            message: "pin mismatch for 1111".to_string(),
            correlation_id: "req-2".to_string(),
        });

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "An unexpected internal error occurred.");
        assert_eq!(body.action, None);
    }

    #[tokio::test]
    async fn chat_then_admin_lookup_over_http() {
        let app = router(test_support::state());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("content-type", "application/json")
                    .header("x-session-id", "web-42")
                    .body(Body::from(r#"{"message":"customer id 1111 pin 2222"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let chat: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(chat["session_id"], "web-42");
        assert_eq!(chat["session"]["verified"], true);

        let response = app
            .oneshot(
                Request::builder().uri("/api/sessions/web-42").body(Body::empty()).expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let snapshot: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(snapshot["identity_hash"], hash_identity_id("1111"));
        assert!(snapshot.get("identity_id").is_none());
        assert!(snapshot.get("pending_pin").is_none());
        assert!(snapshot.get("conversation_history").is_none());
        assert_eq!(snapshot["message_count"], 2);
    }
}

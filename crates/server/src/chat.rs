use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use vaulta_core::{ApplicationError, InterfaceError, SessionSnapshot};

use crate::api::{error_response, ApiError, AppState};

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub requires_human: bool,
    pub correlation_id: String,
    pub session: SessionSnapshot,
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = resolve_session_id(request.session_id.as_deref(), &headers);

    if request.message.trim().is_empty() {
        return Err(error_response(InterfaceError::BadRequest {
            message: "message must not be empty".to_string(),
            correlation_id: Uuid::new_v4().to_string(),
        }));
    }

    match state.orchestrator.process_turn(&session_id, &request.message).await {
        Ok(reply) => {
            info!(
                event_name = "http.chat.replied",
                correlation_id = %reply.correlation_id,
                session_id = %session_id,
                requires_human = reply.requires_human,
                "chat turn served"
            );
            Ok(Json(ChatResponse {
                session_id,
                reply: reply.reply_text,
                requires_human: reply.requires_human,
                correlation_id: reply.correlation_id,
                session: reply.session,
            }))
        }
        Err(error) => {
            let correlation_id = Uuid::new_v4().to_string();
            warn!(
                event_name = "http.chat.rejected",
                correlation_id = %correlation_id,
                session_id = %session_id,
                error_code = error.code(),
                "chat turn rejected"
            );
            Err(error_response(ApplicationError::from(error).into_interface(correlation_id)))
        }
    }
}

/// Body field first, then the `x-session-id` header, then a fresh id.
fn resolve_session_id(from_body: Option<&str>, headers: &HeaderMap) -> String {
    from_body
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("session-{}", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::State,
        http::{HeaderMap, HeaderValue, StatusCode},
        Json,
    };
    use vaulta_agent::prompts;
    use vaulta_core::{FieldUpdate, PendingAction, SessionPatch};

    use super::{chat, resolve_session_id, ChatRequest, SESSION_HEADER};
    use crate::api::test_support;

    fn request(session_id: Option<&str>, message: &str) -> Json<ChatRequest> {
        Json(ChatRequest { session_id: session_id.map(str::to_string), message: message.to_string() })
    }

    #[test]
    fn session_id_prefers_body_then_header_then_generated() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("from-header"));

        assert_eq!(resolve_session_id(Some("from-body"), &headers), "from-body");
        assert_eq!(resolve_session_id(Some("  "), &headers), "from-header");
        assert!(resolve_session_id(None, &HeaderMap::new()).starts_with("session-"));
    }

    #[tokio::test]
    async fn chat_returns_reply_and_snapshot() {
        let state = test_support::state();

        let Json(response) =
            chat(State(state), HeaderMap::new(), request(Some("s-1"), "I lost my card"))
                .await
                .expect("chat should succeed");

        assert_eq!(response.session_id, "s-1");
        assert_eq!(response.reply, prompts::NEED_BOTH);
        assert!(!response.requires_human);
        assert!(!response.session.verified);
    }

    #[tokio::test]
    async fn empty_message_is_a_bad_request() {
        let (status, Json(body)) =
            chat(State(test_support::state()), HeaderMap::new(), request(Some("s-1"), "   "))
                .await
                .expect_err("empty message must be rejected");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "bad_request");
    }

    #[tokio::test]
    async fn unverified_confirmation_is_forbidden_with_auth_action() {
        let state = test_support::state();
        let store = state.orchestrator.store();
        store.get_or_create("s-1");
        store.update(
            "s-1",
            SessionPatch {
                pending_action: FieldUpdate::Set(Some(PendingAction::block_card("CARD_001", "0001"))),
                awaiting_confirmation: FieldUpdate::Set(true),
                ..SessionPatch::default()
            },
        );

        let (status, Json(body)) = chat(State(state), HeaderMap::new(), request(Some("s-1"), "yes"))
            .await
            .expect_err("confirmation must be refused");

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "verification_required");
        assert_eq!(body.action, Some("request_auth"));
    }
}

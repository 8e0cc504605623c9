//! The per-turn pipeline.
//!
//! Stages run in a fixed order: escalation and small talk, credential
//! extraction, the authentication gate, the confirmation protocol (only when
//! the turn began with a prompt outstanding), routing, the gate check for
//! sensitive flows, and finally the topic handler. The resulting
//! [`TurnState`] is folded back into the store as a patch.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vaulta_core::audit::TracingAuditSink;
use vaulta_core::config::AppConfig;
use vaulta_core::{
    hash_identity_id, redact_sensitive_text, AuditCategory, AuditEvent, AuditOutcome, AuditSink,
    CredentialExtractor, ExtractedCredentials, SessionSnapshot, SessionStore, TurnError,
    TurnMessage,
};

use crate::auth_gate::{AuthGate, AuthOutcome};
use crate::collaborators::{
    AccountDirectory, ActionExecutor, DisabledClassifier, IdentityVerifier, IntentClassifier,
};
use crate::confirmation::{ConfirmationPhase, ConfirmationProtocol};
use crate::demo::DemoBank;
use crate::handlers::{general_help, HandlerContext, HandlerRegistry};
use crate::prompts;
use crate::router::{has_intent_keyword, DialogueRouter, RouteRequest};
use crate::smalltalk::{detect_small_talk, is_human_request};
use crate::turn::TurnState;

/// External systems the pipeline calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub executor: Arc<dyn ActionExecutor>,
    pub directory: Arc<dyn AccountDirectory>,
}

impl Collaborators {
    /// Every seam served by `bank`, with the given intent classifier.
    pub fn demo(bank: DemoBank, classifier: Arc<dyn IntentClassifier>) -> Self {
        let bank = Arc::new(bank);
        Self {
            verifier: bank.clone(),
            classifier,
            executor: bank.clone(),
            directory: bank,
        }
    }

    pub fn demo_without_classifier(bank: DemoBank) -> Self {
        Self::demo(bank, Arc::new(DisabledClassifier))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub max_auth_attempts: u32,
    /// Upper bound on every verifier, classifier, handler and executor call.
    pub collaborator_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self { max_auth_attempts: 3, collaborator_timeout: Duration::from_secs(10) }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_auth_attempts: config.session.max_auth_attempts,
            collaborator_timeout: config.agent.collaborator_timeout(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    pub reply_text: String,
    pub requires_human: bool,
    pub correlation_id: String,
    pub session: SessionSnapshot,
}

pub struct TurnOrchestrator {
    store: SessionStore,
    extractor: CredentialExtractor,
    gate: AuthGate,
    router: DialogueRouter,
    confirmation: ConfirmationProtocol,
    handlers: HandlerRegistry,
    directory: Arc<dyn AccountDirectory>,
    audit: Arc<dyn AuditSink>,
    handler_timeout: Duration,
}

impl TurnOrchestrator {
    pub fn new(
        store: SessionStore,
        collaborators: Collaborators,
        settings: OrchestratorSettings,
    ) -> Self {
        let timeout = settings.collaborator_timeout;
        Self {
            store,
            extractor: CredentialExtractor::new(),
            gate: AuthGate::new(collaborators.verifier, settings.max_auth_attempts, timeout),
            router: DialogueRouter::new(collaborators.classifier, timeout),
            confirmation: ConfirmationProtocol::new(collaborators.executor, timeout),
            handlers: HandlerRegistry::with_defaults(),
            directory: collaborators.directory,
            audit: Arc::new(TracingAuditSink),
            handler_timeout: timeout,
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Runs one turn for `session_id`, creating the session on first contact.
    ///
    /// Returns `Err` only for [`TurnError::VerificationRequired`] and
    /// [`TurnError::Internal`]; the session is left untouched in that case.
    pub async fn process_turn(
        &self,
        session_id: &str,
        utterance: &str,
    ) -> Result<TurnReply, TurnError> {
        let correlation_id = Uuid::new_v4().to_string();
        let before = self.store.get_or_create(session_id);
        let mut state = TurnState::from_session(&before);

        self.emit(
            AuditEvent::new(
                session_id,
                &correlation_id,
                "turn.received",
                AuditCategory::Ingress,
                AuditOutcome::Success,
            )
            .with_metadata("verified", before.verified.to_string()),
        );

        let reply_text = match self.run_stages(&mut state, utterance, &correlation_id).await {
            Ok(reply_text) => reply_text,
            Err(error) => {
                warn!(
                    event_name = "turn.failed",
                    session_id,
                    correlation_id = %correlation_id,
                    error_code = error.code(),
                    "turn aborted"
                );
                self.emit(
                    AuditEvent::new(
                        session_id,
                        &correlation_id,
                        "turn.failed",
                        AuditCategory::System,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error_code", error.code()),
                );
                return Err(error);
            }
        };

        let requires_human = state.requires_human;
        let flow = state.current_flow;
        let history = vec![
            TurnMessage::user(redact_sensitive_text(utterance.trim())),
            TurnMessage::assistant(reply_text.clone()),
        ];
        if !self.store.update(session_id, state.into_patch(&before, history)) {
            debug!(
                event_name = "turn.session.evicted",
                session_id,
                correlation_id = %correlation_id,
                "session evicted mid-turn, update dropped"
            );
        }
        let session = self.store.snapshot(session_id).unwrap_or_else(|| before.snapshot());

        info!(
            event_name = "turn.completed",
            session_id,
            correlation_id = %correlation_id,
            flow = flow.map(|flow| flow.label()).unwrap_or("none"),
            verified = session.verified,
            awaiting_confirmation = session.awaiting_confirmation,
            requires_human,
            "turn completed"
        );

        Ok(TurnReply { reply_text, requires_human, correlation_id, session })
    }

    async fn run_stages(
        &self,
        state: &mut TurnState,
        utterance: &str,
        correlation_id: &str,
    ) -> Result<String, TurnError> {
        let lowered = utterance.trim().to_lowercase();
        let awaiting = state.confirmation.is_awaiting();

        if !awaiting {
            if is_human_request(&lowered) {
                state.requires_human = true;
                self.emit(
                    self.event(
                        state,
                        correlation_id,
                        "turn.escalated",
                        AuditCategory::System,
                        AuditOutcome::Success,
                    )
                    .with_metadata("reason", "customer_request"),
                );
                return Ok(prompts::ESCALATION.to_string());
            }
            if let Some(kind) = detect_small_talk(&lowered) {
                state.flags.small_talk = Some(kind);
                debug!(
                    event_name = "turn.small_talk",
                    session_id = %state.session_id,
                    kind = kind.label(),
                    "small talk answered"
                );
                return Ok(kind.reply());
            }
        }

        let credentials = if state.verified {
            ExtractedCredentials::default()
        } else {
            self.extractor.extract(utterance)
        };
        let supplied_credentials = !credentials.is_empty();
        let intent_text =
            if supplied_credentials { self.extractor.strip(utterance) } else { lowered.clone() };
        let credential_only = supplied_credentials && !has_intent_keyword(&intent_text);

        let auth = self.gate.evaluate(state, credentials).await;
        self.record_auth(state, &auth, correlation_id);

        if auth.locked {
            state.requires_human = true;
            return Ok(prompts::LOCKED.to_string());
        }
        if auth.failed() {
            return Ok(prompts::verification_failed(auth.remaining_attempts.unwrap_or_default()));
        }
        if auth.unavailable {
            return Ok(prompts::VERIFICATION_UNAVAILABLE.to_string());
        }

        if awaiting {
            let reply = self.confirmation.resolve(state, &lowered).await?;
            let (event_type, outcome) = match state.confirmation {
                ConfirmationPhase::Executed if state.requires_human => {
                    ("confirmation.execution_failed", AuditOutcome::Failed)
                }
                ConfirmationPhase::Executed => ("confirmation.executed", AuditOutcome::Success),
                ConfirmationPhase::Cancelled => ("confirmation.cancelled", AuditOutcome::Rejected),
                _ => ("confirmation.reprompted", AuditOutcome::Rejected),
            };
            self.emit(self.event(
                state,
                correlation_id,
                event_type,
                AuditCategory::Confirmation,
                outcome,
            ));
            return Ok(reply);
        }

        let route_text = if credential_only {
            state.flags.lock_flow = true;
            state.last_intent_utterance.clone().unwrap_or_default()
        } else {
            state.last_intent_utterance = Some(redact_sensitive_text(&intent_text));
            intent_text
        };

        if auth.verified_now() {
            if let Some(resumed) = state.original_flow.take() {
                state.flags.force_reroute = true;
                if credential_only {
                    state.current_flow = Some(resumed);
                }
            }
        }
        if !state.verified && state.current_flow.is_some_and(|flow| flow.requires_verification()) {
            state.flags.lock_flow = true;
        }

        let decision = self
            .router
            .route(RouteRequest {
                text: &route_text,
                current_flow: state.current_flow,
                lock_flow: state.flags.lock_flow,
                force_reroute: state.flags.force_reroute,
            })
            .await;
        state.current_flow = decision.flow;
        self.emit(
            self.event(
                state,
                correlation_id,
                "flow.routed",
                AuditCategory::Routing,
                AuditOutcome::Success,
            )
            .with_metadata("flow", decision.flow.map(|flow| flow.label()).unwrap_or("none"))
            .with_metadata("source", decision.source.label()),
        );

        let Some(flow) = decision.flow else {
            if credential_only && !state.verified {
                return Ok(auth.credential_prompt().to_string());
            }
            if auth.verified_now() {
                return Ok(prompts::VERIFIED_READY.to_string());
            }
            return Ok(general_help().text);
        };

        if flow.requires_verification() && !state.verified {
            state.original_flow = Some(flow);
            self.emit(
                self.event(
                    state,
                    correlation_id,
                    "flow.gated",
                    AuditCategory::Auth,
                    AuditOutcome::Rejected,
                )
                .with_metadata("flow", flow.label()),
            );
            return Ok(auth.credential_prompt().to_string());
        }

        let Some(handler) = self.handlers.get(flow) else {
            return Ok(general_help().text);
        };
        let outcome = {
            let context = HandlerContext {
                session_id: &state.session_id,
                identity_id: state.identity_id.as_deref(),
                utterance: &route_text,
                last_assistant_message: state.last_assistant_message.as_deref(),
                directory: self.directory.as_ref(),
            };
            tokio::time::timeout(self.handler_timeout, handler.handle(context)).await
        };

        let error = match outcome {
            Ok(Ok(reply)) => {
                if let Some(action) = reply.staged_action {
                    self.emit(
                        self.event(
                            state,
                            correlation_id,
                            "confirmation.requested",
                            AuditCategory::Confirmation,
                            AuditOutcome::Success,
                        )
                        .with_metadata("action", action.kind.action_key()),
                    );
                    state.stage_action(action);
                }
                if reply.requires_human {
                    state.requires_human = true;
                    self.emit(
                        self.event(
                            state,
                            correlation_id,
                            "turn.escalated",
                            AuditCategory::System,
                            AuditOutcome::Success,
                        )
                        .with_metadata("reason", "handler")
                        .with_metadata("flow", flow.label()),
                    );
                }
                return Ok(reply.text);
            }
            Ok(Err(error)) => TurnError::Internal(error.to_string()),
            Err(_) => TurnError::CollaboratorTimeout { collaborator: "topic handler" },
        };

        warn!(
            event_name = "turn.handler.failed",
            session_id = %state.session_id,
            flow = flow.label(),
            error_code = error.code(),
            "topic handler failed, apologizing"
        );
        self.emit(
            self.event(
                state,
                correlation_id,
                "handler.failed",
                AuditCategory::System,
                AuditOutcome::Failed,
            )
            .with_metadata("flow", flow.label())
            .with_metadata("error_code", error.code()),
        );
        Ok(prompts::HANDLER_APOLOGY.to_string())
    }

    fn record_auth(&self, state: &TurnState, auth: &AuthOutcome, correlation_id: &str) {
        let (event_type, outcome) = if auth.locked {
            ("auth.locked", AuditOutcome::Rejected)
        } else if auth.verified_now() {
            ("auth.verified", AuditOutcome::Success)
        } else if auth.failed() {
            ("auth.failed", AuditOutcome::Rejected)
        } else if auth.unavailable {
            ("auth.unavailable", AuditOutcome::Failed)
        } else {
            return;
        };

        let mut event = self.event(state, correlation_id, event_type, AuditCategory::Auth, outcome);
        if let Some(remaining) = auth.remaining_attempts {
            event = event.with_metadata("remaining_attempts", remaining.to_string());
        }
        if let Some(identity_id) = &state.identity_id {
            event = event.with_metadata("identity_hash", hash_identity_id(identity_id));
        }
        self.emit(event);
    }

    fn event(
        &self,
        state: &TurnState,
        correlation_id: &str,
        event_type: &str,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(&state.session_id, correlation_id, event_type, category, outcome)
    }

    fn emit(&self, event: AuditEvent) {
        self.audit.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use vaulta_core::{FlowCategory, InMemoryAuditSink, SessionStore};

    use super::{Collaborators, OrchestratorSettings, TurnOrchestrator};
    use crate::demo::DemoBank;
    use crate::prompts;

    fn orchestrator() -> (TurnOrchestrator, InMemoryAuditSink) {
        let audit = InMemoryAuditSink::default();
        let orchestrator = TurnOrchestrator::new(
            SessionStore::new(Duration::from_secs(300), 10),
            Collaborators::demo_without_classifier(DemoBank::seeded()),
            OrchestratorSettings::default(),
        )
        .with_audit_sink(Arc::new(audit.clone()));
        (orchestrator, audit)
    }

    #[tokio::test]
    async fn small_talk_does_not_touch_the_flow() {
        let (orchestrator, _) = orchestrator();

        let reply = orchestrator.process_turn("s-1", "hello there").await.expect("turn");

        assert_eq!(reply.reply_text, "Hi! How can I help you today?");
        assert!(reply.session.current_flow.is_none());
        assert_eq!(reply.session.message_count, 2);
    }

    #[tokio::test]
    async fn human_request_escalates() {
        let (orchestrator, audit) = orchestrator();

        let reply =
            orchestrator.process_turn("s-1", "let me talk to a human please").await.expect("turn");

        assert!(reply.requires_human);
        assert_eq!(reply.reply_text, prompts::ESCALATION);
        assert_eq!(audit.events_of_type("turn.escalated").len(), 1);
    }

    #[tokio::test]
    async fn open_flow_is_served_without_verification() {
        let (orchestrator, _) = orchestrator();

        let reply =
            orchestrator.process_turn("s-1", "I can't login to the app").await.expect("turn");

        assert_eq!(reply.session.current_flow, Some(FlowCategory::DigitalSupport));
        assert!(reply.reply_text.starts_with("I can help with app issues!"));
        assert!(!reply.session.verified);
    }

    #[tokio::test]
    async fn unknown_request_gets_general_help() {
        let (orchestrator, _) = orchestrator();

        let reply = orchestrator.process_turn("s-1", "tell me about mortgages").await.expect("turn");

        assert_eq!(reply.reply_text, prompts::GENERAL_HELP);
        assert!(reply.session.current_flow.is_none());
    }

    #[tokio::test]
    async fn audit_trail_never_contains_raw_credentials() {
        let (orchestrator, audit) = orchestrator();

        orchestrator.process_turn("s-1", "what's my balance").await.expect("turn");
        orchestrator.process_turn("s-1", "customer id 1111 pin 2222").await.expect("turn");

        let events = audit.events();
        assert!(!events.is_empty());
        for event in events {
            for value in event.metadata.values() {
                assert!(!value.contains("1111"), "{event:?}");
                assert!(!value.contains("2222"), "{event:?}");
            }
        }
        assert_eq!(audit.events_of_type("auth.verified").len(), 1);
    }
}

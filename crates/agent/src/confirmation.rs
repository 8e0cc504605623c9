//! Explicit yes/no protocol guarding irreversible actions.
//!
//! A handler stages a [`PendingAction`] and prompts in the same turn
//! ([`ConfirmationPhase::Asked`]). Only a turn that *starts* with the session
//! awaiting a reply interprets the utterance as an answer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use vaulta_core::{PendingAction, TurnError};

use crate::collaborators::ActionExecutor;
use crate::prompts;
use crate::turn::TurnState;

const AFFIRMATIVE: &[&str] = &["yes", "confirm", "proceed", "sure"];
const NEGATIVE: &[&str] = &["no", "cancel", "stop", "wait"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfirmationPhase {
    #[default]
    Idle,
    /// The action was staged and the prompt sent during this turn.
    Asked,
    /// The turn began with a prompt outstanding; this utterance is the reply.
    Awaiting,
    Executed,
    Cancelled,
}

impl ConfirmationPhase {
    pub fn is_awaiting(self) -> bool {
        self == Self::Awaiting
    }

    /// Whether the session should expect a yes/no on the next turn.
    pub fn awaits_reply(self) -> bool {
        matches!(self, Self::Asked | Self::Awaiting)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyKind {
    Affirmative,
    Negative,
    Unclear,
}

/// Whole-word match against the two keyword sets. A reply carrying any
/// negative word is treated as a refusal even if it also says yes.
pub fn classify_reply(text: &str) -> ReplyKind {
    let lowered = text.to_lowercase();
    let words = lowered.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty());
    let (mut affirmative, mut negative) = (false, false);
    for word in words {
        affirmative |= AFFIRMATIVE.contains(&word);
        negative |= NEGATIVE.contains(&word);
    }

    match (affirmative, negative) {
        (_, true) => ReplyKind::Negative,
        (true, false) => ReplyKind::Affirmative,
        (false, false) => ReplyKind::Unclear,
    }
}

pub struct ConfirmationProtocol {
    executor: Arc<dyn ActionExecutor>,
    timeout: Duration,
}

impl ConfirmationProtocol {
    pub fn new(executor: Arc<dyn ActionExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    /// Interprets `reply` against the staged action and returns the text to
    /// send back. Fails with [`TurnError::VerificationRequired`] when the
    /// session is not verified.
    pub async fn resolve(&self, state: &mut TurnState, reply: &str) -> Result<String, TurnError> {
        if !state.verified {
            return Err(TurnError::VerificationRequired);
        }
        let Some(action) = state.pending_action.clone() else {
            state.confirmation = ConfirmationPhase::Idle;
            return Err(TurnError::Internal("confirmation without a pending action".to_string()));
        };

        match classify_reply(reply) {
            ReplyKind::Affirmative => Ok(self.execute(state, &action).await),
            ReplyKind::Negative => {
                state.pending_action = None;
                state.confirmation = ConfirmationPhase::Cancelled;
                info!(
                    event_name = "turn.confirmation.cancelled",
                    session_id = %state.session_id,
                    action = action.kind.action_key(),
                    "pending action cancelled"
                );
                Ok(prompts::confirmation_cancelled(&action))
            }
            ReplyKind::Unclear => {
                state.confirmation = ConfirmationPhase::Asked;
                Ok(prompts::unclear_confirmation(&action))
            }
        }
    }

    async fn execute(&self, state: &mut TurnState, action: &PendingAction) -> String {
        state.pending_action = None;
        state.confirmation = ConfirmationPhase::Executed;

        let identity_id = state.identity_id.clone().unwrap_or_default();
        let outcome =
            tokio::time::timeout(self.timeout, self.executor.execute_action(&identity_id, action))
                .await;

        let error = match outcome {
            Ok(Ok(message)) => {
                info!(
                    event_name = "turn.confirmation.executed",
                    session_id = %state.session_id,
                    action = action.kind.action_key(),
                    "pending action executed"
                );
                return message;
            }
            Ok(Err(error)) => TurnError::ActionExecutionFailed(error.to_string()),
            Err(_) => TurnError::CollaboratorTimeout { collaborator: "action executor" },
        };

        warn!(
            event_name = "turn.confirmation.execution_failed",
            session_id = %state.session_id,
            action = action.kind.action_key(),
            error_code = error.code(),
            "pending action failed, escalating"
        );
        state.requires_human = true;
        prompts::action_failed(action)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use vaulta_core::{PendingAction, Session, TurnError};

    use super::{classify_reply, ConfirmationPhase, ConfirmationProtocol, ReplyKind};
    use crate::collaborators::ActionExecutor;
    use crate::turn::TurnState;

    #[derive(Default)]
    struct RecordingExecutor {
        executed: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ActionExecutor for RecordingExecutor {
        async fn execute_action(&self, _identity_id: &str, action: &PendingAction) -> Result<String> {
            if self.fail {
                return Err(anyhow!("core banking offline"));
            }
            self.executed.lock().expect("executor lock").push(action.target.clone());
            Ok(format!("Done: {}", action.target))
        }
    }

    fn awaiting_state(verified: bool) -> TurnState {
        let mut session = Session::new("s-1", Utc::now());
        session.verified = verified;
        session.identity_id = verified.then(|| "1111".to_string());
        session.pending_action = Some(PendingAction::block_card("CARD_001", "0001"));
        session.awaiting_confirmation = true;
        TurnState::from_session(&session)
    }

    #[test]
    fn replies_are_classified_by_whole_words() {
        assert_eq!(classify_reply("Yes, please"), ReplyKind::Affirmative);
        assert_eq!(classify_reply("sure"), ReplyKind::Affirmative);
        assert_eq!(classify_reply("No thanks"), ReplyKind::Negative);
        assert_eq!(classify_reply("cancel that"), ReplyKind::Negative);
        assert_eq!(classify_reply("maybe"), ReplyKind::Unclear);
        assert_eq!(classify_reply("I know now"), ReplyKind::Unclear);
        assert_eq!(classify_reply("yes... no wait"), ReplyKind::Negative);
    }

    #[tokio::test]
    async fn yes_executes_and_clears_pending_action() {
        let executor = Arc::new(RecordingExecutor::default());
        let protocol = ConfirmationProtocol::new(executor.clone(), Duration::from_secs(1));
        let mut state = awaiting_state(true);

        let reply = protocol.resolve(&mut state, "yes").await.expect("resolved");

        assert_eq!(reply, "Done: CARD_001");
        assert!(state.pending_action.is_none());
        assert_eq!(state.confirmation, ConfirmationPhase::Executed);
        assert_eq!(executor.executed.lock().expect("executor lock").len(), 1);
    }

    #[tokio::test]
    async fn no_cancels_without_executing() {
        let executor = Arc::new(RecordingExecutor::default());
        let protocol = ConfirmationProtocol::new(executor.clone(), Duration::from_secs(1));
        let mut state = awaiting_state(true);

        let reply = protocol.resolve(&mut state, "no").await.expect("resolved");

        assert!(reply.contains("block your card ending in 0001"));
        assert!(state.pending_action.is_none());
        assert!(!state.confirmation.awaits_reply());
        assert!(executor.executed.lock().expect("executor lock").is_empty());
    }

    #[tokio::test]
    async fn unclear_reply_keeps_action_and_reprompts() {
        let protocol = ConfirmationProtocol::new(
            Arc::new(RecordingExecutor::default()),
            Duration::from_secs(1),
        );
        let mut state = awaiting_state(true);

        let reply = protocol.resolve(&mut state, "maybe").await.expect("resolved");

        assert_eq!(
            reply,
            "I need a clear confirmation. Do you want to block your card ending in 0001? \
             Please say YES to proceed or NO to cancel."
        );
        assert!(state.pending_action.is_some());
        assert!(state.confirmation.awaits_reply());
    }

    #[tokio::test]
    async fn unverified_confirmation_is_fatal() {
        let protocol = ConfirmationProtocol::new(
            Arc::new(RecordingExecutor::default()),
            Duration::from_secs(1),
        );
        let mut state = awaiting_state(false);

        let error = protocol.resolve(&mut state, "yes").await.expect_err("must fail");
        assert_eq!(error, TurnError::VerificationRequired);
        assert!(state.pending_action.is_some());
    }

    #[tokio::test]
    async fn executor_failure_apologizes_and_escalates() {
        let protocol = ConfirmationProtocol::new(
            Arc::new(RecordingExecutor { fail: true, ..RecordingExecutor::default() }),
            Duration::from_secs(1),
        );
        let mut state = awaiting_state(true);

        let reply = protocol.resolve(&mut state, "confirm").await.expect("resolved");

        assert!(reply.starts_with("I'm sorry"));
        assert!(!reply.contains("core banking offline"));
        assert!(state.requires_human);
        assert!(state.pending_action.is_none());
    }
}

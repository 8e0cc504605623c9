use secrecy::SecretString;
use vaulta_core::{
    FieldUpdate, FlowCategory, PendingAction, Session, SessionPatch, TurnMessage,
};

use crate::confirmation::ConfirmationPhase;
use crate::smalltalk::SmallTalk;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnFlags {
    pub small_talk: Option<SmallTalk>,
    pub lock_flow: bool,
    pub force_reroute: bool,
}

/// Working state of a single turn. Built from the stored session, mutated by
/// each pipeline stage, then folded back as a patch of the fields that
/// actually changed.
#[derive(Clone, Debug)]
pub struct TurnState {
    pub session_id: String,
    pub verified: bool,
    pub identity_id: Option<String>,
    pub auth_attempts: u32,
    pub locked: bool,
    pub pending_identity_id: Option<String>,
    pub pending_pin: Option<SecretString>,
    pub current_flow: Option<FlowCategory>,
    pub original_flow: Option<FlowCategory>,
    pub pending_action: Option<PendingAction>,
    pub requires_human: bool,
    pub last_intent_utterance: Option<String>,
    pub confirmation: ConfirmationPhase,
    pub flags: TurnFlags,
    pub last_assistant_message: Option<String>,
}

impl TurnState {
    pub fn from_session(session: &Session) -> Self {
        let confirmation = if session.awaiting_confirmation && session.pending_action.is_some() {
            ConfirmationPhase::Awaiting
        } else {
            ConfirmationPhase::Idle
        };

        Self {
            session_id: session.session_id.clone(),
            verified: session.verified,
            identity_id: session.identity_id.clone(),
            auth_attempts: session.auth_attempts,
            locked: session.locked,
            pending_identity_id: session.pending_identity_id.clone(),
            pending_pin: session.pending_pin.clone(),
            current_flow: session.current_flow,
            original_flow: session.original_flow,
            pending_action: session.pending_action.clone(),
            requires_human: session.requires_human,
            last_intent_utterance: session.last_intent_utterance.clone(),
            confirmation,
            flags: TurnFlags::default(),
            last_assistant_message: session
                .conversation_history
                .iter()
                .rev()
                .find(|message| message.is_assistant())
                .map(|message| message.content.clone()),
        }
    }

    pub fn stage_action(&mut self, action: PendingAction) {
        self.pending_action = Some(action);
        self.confirmation = ConfirmationPhase::Asked;
    }

    pub fn into_patch(self, before: &Session, history: Vec<TurnMessage>) -> SessionPatch {
        let pending_pin = if before.pending_pin.is_none() && self.pending_pin.is_none() {
            FieldUpdate::Keep
        } else {
            FieldUpdate::Set(self.pending_pin)
        };

        SessionPatch {
            identity_id: changed(&before.identity_id, self.identity_id),
            verified: changed(&before.verified, self.verified),
            auth_attempts: changed(&before.auth_attempts, self.auth_attempts),
            locked: changed(&before.locked, self.locked),
            pending_identity_id: changed(&before.pending_identity_id, self.pending_identity_id),
            pending_pin,
            current_flow: changed(&before.current_flow, self.current_flow),
            original_flow: changed(&before.original_flow, self.original_flow),
            pending_action: changed(&before.pending_action, self.pending_action),
            awaiting_confirmation: changed(
                &before.awaiting_confirmation,
                self.confirmation.awaits_reply(),
            ),
            requires_human: changed(&before.requires_human, self.requires_human),
            last_intent_utterance: changed(
                &before.last_intent_utterance,
                self.last_intent_utterance,
            ),
            append_history: history,
        }
    }
}

fn changed<T: PartialEq>(before: &T, after: T) -> FieldUpdate<T> {
    if *before == after {
        FieldUpdate::Keep
    } else {
        FieldUpdate::Set(after)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use vaulta_core::{FlowCategory, PendingAction, Session};

    use super::TurnState;
    use crate::confirmation::ConfirmationPhase;

    #[test]
    fn awaiting_phase_requires_a_pending_action() {
        let mut session = Session::new("s-1", Utc::now());
        session.awaiting_confirmation = true;
        assert_eq!(TurnState::from_session(&session).confirmation, ConfirmationPhase::Idle);

        session.pending_action = Some(PendingAction::block_card("CARD_001", "0001"));
        assert_eq!(TurnState::from_session(&session).confirmation, ConfirmationPhase::Awaiting);
    }

    #[test]
    fn patch_only_carries_changed_fields() {
        let mut session = Session::new("s-1", Utc::now());
        session.current_flow = Some(FlowCategory::CardIssues);

        let mut state = TurnState::from_session(&session);
        state.auth_attempts = 1;
        let patch = state.into_patch(&session, Vec::new());

        assert!(patch.current_flow.is_keep());
        assert!(patch.verified.is_keep());
        assert!(!patch.auth_attempts.is_keep());
    }

    #[test]
    fn staged_action_is_persisted_as_awaiting() {
        let session = Session::new("s-1", Utc::now());
        let mut state = TurnState::from_session(&session);
        state.stage_action(PendingAction::block_card("CARD_001", "0001"));

        let mut stored = session.clone();
        stored.apply(state.into_patch(&session, Vec::new()), 10);
        assert!(stored.awaiting_confirmation);
        assert!(stored.pending_action.is_some());
    }
}

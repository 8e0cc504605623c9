//! Per-conversation state and its in-memory store.
//!
//! Sessions live only in process memory. They are created on first contact,
//! patched once per turn, and evicted by the background sweeper after a
//! period of inactivity or by an explicit administrative reset.

pub mod store;
pub mod sweeper;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::domain::{FlowCategory, PendingAction, TurnMessage};
use crate::redact::hash_identity_id;

pub use store::{ResetScope, SessionStore};
pub use sweeper::{spawn_sweeper, SweeperHandle};

#[derive(Clone, Debug)]
pub struct Session {
    pub session_id: String,
    /// Set only after a successful verification.
    pub identity_id: Option<String>,
    pub verified: bool,
    pub auth_attempts: u32,
    /// Once set, only an administrative reset clears it.
    pub locked: bool,
    /// A customer id supplied on its own, waiting for the matching PIN.
    pub pending_identity_id: Option<String>,
    /// A PIN supplied on its own, waiting for the matching customer id. Held
    /// only in memory and never part of a snapshot.
    pub pending_pin: Option<SecretString>,
    pub current_flow: Option<FlowCategory>,
    /// The sensitive flow interrupted by the auth gate, resumed on the first
    /// verified turn.
    pub original_flow: Option<FlowCategory>,
    pub pending_action: Option<PendingAction>,
    pub awaiting_confirmation: bool,
    pub requires_human: bool,
    pub last_intent_utterance: Option<String>,
    pub conversation_history: Vec<TurnMessage>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            identity_id: None,
            verified: false,
            auth_attempts: 0,
            locked: false,
            pending_identity_id: None,
            pending_pin: None,
            current_flow: None,
            original_flow: None,
            pending_action: None,
            awaiting_confirmation: false,
            requires_human: false,
            last_intent_utterance: None,
            conversation_history: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Applies a partial update. `locked` can only move from false to true and
    /// a locked session is never verified.
    pub fn apply(&mut self, patch: SessionPatch, max_history: usize) {
        patch.identity_id.apply_to(&mut self.identity_id);
        patch.verified.apply_to(&mut self.verified);
        patch.auth_attempts.apply_to(&mut self.auth_attempts);
        if let FieldUpdate::Set(true) = patch.locked {
            self.locked = true;
        }
        patch.pending_identity_id.apply_to(&mut self.pending_identity_id);
        patch.pending_pin.apply_to(&mut self.pending_pin);
        patch.current_flow.apply_to(&mut self.current_flow);
        patch.original_flow.apply_to(&mut self.original_flow);
        patch.pending_action.apply_to(&mut self.pending_action);
        patch.awaiting_confirmation.apply_to(&mut self.awaiting_confirmation);
        patch.requires_human.apply_to(&mut self.requires_human);
        patch.last_intent_utterance.apply_to(&mut self.last_intent_utterance);

        if self.locked {
            self.verified = false;
            self.pending_identity_id = None;
            self.pending_pin = None;
        }

        self.conversation_history.extend(patch.append_history);
        if self.conversation_history.len() > max_history {
            let overflow = self.conversation_history.len() - max_history;
            self.conversation_history.drain(..overflow);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            identity_hash: self.identity_id.as_deref().map(hash_identity_id),
            verified: self.verified,
            auth_attempts: self.auth_attempts,
            locked: self.locked,
            awaiting_pin: self.pending_identity_id.is_some(),
            awaiting_identity_id: self.pending_pin.is_some(),
            current_flow: self.current_flow,
            original_flow: self.original_flow,
            pending_action: self.pending_action.clone(),
            awaiting_confirmation: self.awaiting_confirmation,
            requires_human: self.requires_human,
            message_count: self.conversation_history.len(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// A single field of a [`SessionPatch`]. `Keep` leaves the stored value as
/// is; `Set(None)` on an optional field clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn apply_to(self, target: &mut T) {
        if let Self::Set(value) = self {
            *target = value;
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionPatch {
    pub identity_id: FieldUpdate<Option<String>>,
    pub verified: FieldUpdate<bool>,
    pub auth_attempts: FieldUpdate<u32>,
    pub locked: FieldUpdate<bool>,
    pub pending_identity_id: FieldUpdate<Option<String>>,
    pub pending_pin: FieldUpdate<Option<SecretString>>,
    pub current_flow: FieldUpdate<Option<FlowCategory>>,
    pub original_flow: FieldUpdate<Option<FlowCategory>>,
    pub pending_action: FieldUpdate<Option<PendingAction>>,
    pub awaiting_confirmation: FieldUpdate<bool>,
    pub requires_human: FieldUpdate<bool>,
    pub last_intent_utterance: FieldUpdate<Option<String>>,
    pub append_history: Vec<TurnMessage>,
}

/// Operator view of a session: the identity id is hashed and the history is
/// reduced to a count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub identity_hash: Option<String>,
    pub verified: bool,
    pub auth_attempts: u32,
    pub locked: bool,
    pub awaiting_pin: bool,
    pub awaiting_identity_id: bool,
    pub current_flow: Option<FlowCategory>,
    pub original_flow: Option<FlowCategory>,
    pub pending_action: Option<PendingAction>,
    pub awaiting_confirmation: bool,
    pub requires_human: bool,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{FieldUpdate, Session, SessionPatch};
    use crate::domain::{FlowCategory, TurnMessage};

    #[test]
    fn keep_fields_are_left_untouched() {
        let mut session = Session::new("s-1", Utc::now());
        session.current_flow = Some(FlowCategory::Transfers);

        session.apply(
            SessionPatch { auth_attempts: FieldUpdate::Set(1), ..SessionPatch::default() },
            10,
        );

        assert_eq!(session.current_flow, Some(FlowCategory::Transfers));
        assert_eq!(session.auth_attempts, 1);
    }

    #[test]
    fn set_none_clears_optional_field() {
        let mut session = Session::new("s-1", Utc::now());
        session.original_flow = Some(FlowCategory::CardIssues);

        session.apply(
            SessionPatch { original_flow: FieldUpdate::Set(None), ..SessionPatch::default() },
            10,
        );

        assert_eq!(session.original_flow, None);
    }

    #[test]
    fn locked_is_monotonic_and_forces_unverified() {
        let mut session = Session::new("s-1", Utc::now());
        session.apply(
            SessionPatch { locked: FieldUpdate::Set(true), ..SessionPatch::default() },
            10,
        );
        session.apply(
            SessionPatch {
                locked: FieldUpdate::Set(false),
                verified: FieldUpdate::Set(true),
                ..SessionPatch::default()
            },
            10,
        );

        assert!(session.locked);
        assert!(!session.verified);
    }

    #[test]
    fn history_keeps_only_most_recent_entries() {
        let mut session = Session::new("s-1", Utc::now());
        let messages = (0..5).map(|index| TurnMessage::user(format!("m{index}"))).collect();

        session.apply(SessionPatch { append_history: messages, ..SessionPatch::default() }, 3);

        let contents =
            session.conversation_history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn snapshot_hashes_identity_and_counts_messages() {
        let mut session = Session::new("s-1", Utc::now());
        session.identity_id = Some("1234".to_string());
        session.conversation_history.push(TurnMessage::user("hi"));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.message_count, 1);
        let hash = snapshot.identity_hash.unwrap_or_default();
        assert_eq!(hash.len(), 8);
        assert_ne!(hash, "1234");
    }
}

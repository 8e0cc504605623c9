use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};
use vaulta_core::{hash_identity_id, ExtractedCredentials, TurnError};

use crate::collaborators::IdentityVerifier;
use crate::prompts;
use crate::turn::TurnState;

const PIN_LENGTH: usize = 4;

/// What the gate concluded for one turn. Never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuthOutcome {
    /// The verifier was asked (or would have been, had the session not been
    /// out of attempts).
    pub attempted: bool,
    pub success: Option<bool>,
    pub remaining_attempts: Option<u32>,
    pub locked: bool,
    pub needs_id: bool,
    pub needs_pin: bool,
    /// The verifier failed or timed out; no attempt was counted.
    pub unavailable: bool,
}

impl AuthOutcome {
    pub fn verified_now(&self) -> bool {
        self.success == Some(true)
    }

    pub fn failed(&self) -> bool {
        self.attempted && self.success == Some(false) && !self.locked
    }

    /// The prompt asking for whatever part of the credentials is missing.
    pub fn credential_prompt(&self) -> &'static str {
        match (self.needs_id, self.needs_pin) {
            (false, true) => prompts::NEED_PIN,
            (true, false) => prompts::NEED_IDENTITY_ID,
            _ => prompts::NEED_BOTH,
        }
    }

    fn incomplete(state: &TurnState) -> Self {
        Self {
            needs_id: state.pending_identity_id.is_none(),
            needs_pin: state.pending_pin.is_none(),
            ..Self::default()
        }
    }
}

pub struct AuthGate {
    verifier: Arc<dyn IdentityVerifier>,
    max_attempts: u32,
    timeout: Duration,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, max_attempts: u32, timeout: Duration) -> Self {
        Self { verifier, max_attempts, timeout }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs the gate for one turn, merging `credentials` with any half
    /// supplied on an earlier turn. Mutates only the auth fields of `state`.
    pub async fn evaluate(
        &self,
        state: &mut TurnState,
        credentials: ExtractedCredentials,
    ) -> AuthOutcome {
        if state.verified {
            return AuthOutcome::default();
        }
        if state.locked {
            return AuthOutcome { locked: true, success: Some(false), ..AuthOutcome::default() };
        }

        let ExtractedCredentials { mut identity_id, mut pin } = credentials;

        if pin.is_none() {
            if let (Some(pending), Some(solo)) = (&state.pending_identity_id, &identity_id) {
                // A bare four-digit group after an id was given is the PIN.
                if solo.len() == PIN_LENGTH && solo != pending {
                    pin = Some(SecretString::from(solo.clone()));
                    identity_id = Some(pending.clone());
                }
            }
        }
        if identity_id.is_none() && pin.is_some() {
            identity_id = state.pending_identity_id.clone();
        }
        if pin.is_none() && identity_id.is_some() {
            pin = state.pending_pin.clone();
        }

        match (identity_id, pin) {
            (Some(identity_id), Some(pin)) => {
                state.pending_identity_id = None;
                state.pending_pin = None;
                self.verify(state, identity_id, pin).await
            }
            (Some(identity_id), None) => {
                state.pending_identity_id = Some(identity_id);
                state.pending_pin = None;
                AuthOutcome::incomplete(state)
            }
            (None, Some(pin)) => {
                state.pending_pin = Some(pin);
                AuthOutcome::incomplete(state)
            }
            (None, None) => AuthOutcome::incomplete(state),
        }
    }

    async fn verify(
        &self,
        state: &mut TurnState,
        identity_id: String,
        pin: SecretString,
    ) -> AuthOutcome {
        let identity_hash = hash_identity_id(&identity_id);

        if state.auth_attempts >= self.max_attempts {
            state.locked = true;
            return AuthOutcome {
                attempted: true,
                success: Some(false),
                remaining_attempts: Some(0),
                locked: true,
                ..AuthOutcome::default()
            };
        }

        let verdict = tokio::time::timeout(
            self.timeout,
            self.verifier.verify_identity(&identity_id, pin.expose_secret()),
        )
        .await;

        match verdict {
            Ok(Ok(true)) => {
                state.verified = true;
                state.identity_id = Some(identity_id);
                state.auth_attempts = 0;
                info!(
                    event_name = "turn.auth.verified",
                    session_id = %state.session_id,
                    identity = %identity_hash,
                    "identity verified"
                );
                AuthOutcome { attempted: true, success: Some(true), ..AuthOutcome::default() }
            }
            Ok(Ok(false)) => {
                state.auth_attempts = state.auth_attempts.saturating_add(1).min(self.max_attempts);
                let remaining = self.max_attempts.saturating_sub(state.auth_attempts);
                if remaining == 0 {
                    state.locked = true;
                }
                let event_name =
                    if state.locked { "turn.auth.locked" } else { "turn.auth.failed" };
                warn!(
                    event_name,
                    session_id = %state.session_id,
                    identity = %identity_hash,
                    attempts = state.auth_attempts,
                    remaining,
                    "identity verification failed"
                );
                AuthOutcome {
                    attempted: true,
                    success: Some(false),
                    remaining_attempts: Some(remaining),
                    locked: state.locked,
                    ..AuthOutcome::default()
                }
            }
            Ok(Err(error)) => {
                self.unavailable(state, identity_id, TurnError::Internal(error.to_string()))
            }
            Err(_) => self.unavailable(
                state,
                identity_id,
                TurnError::CollaboratorTimeout { collaborator: "identity verifier" },
            ),
        }
    }

    fn unavailable(
        &self,
        state: &mut TurnState,
        identity_id: String,
        error: TurnError,
    ) -> AuthOutcome {
        warn!(
            event_name = "turn.auth.verifier_unavailable",
            session_id = %state.session_id,
            error_code = error.code(),
            "identity verifier unavailable, attempt not counted"
        );
        state.pending_identity_id = Some(identity_id);
        AuthOutcome { unavailable: true, needs_pin: true, ..AuthOutcome::default() }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use vaulta_core::{CredentialExtractor, Session};

    use super::AuthGate;
    use crate::collaborators::IdentityVerifier;
    use crate::prompts;
    use crate::turn::TurnState;

    #[derive(Default)]
    struct FixedVerifier {
        calls: AtomicUsize,
        hang: bool,
    }

    #[async_trait]
    impl IdentityVerifier for FixedVerifier {
        async fn verify_identity(&self, identity_id: &str, pin: &str) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(identity_id == "1111" && pin == "2222")
        }
    }

    fn gate(verifier: Arc<FixedVerifier>) -> AuthGate {
        AuthGate::new(verifier, 3, Duration::from_millis(50))
    }

    fn state() -> TurnState {
        TurnState::from_session(&Session::new("s-1", Utc::now()))
    }

    async fn submit(gate: &AuthGate, state: &mut TurnState, text: &str) -> super::AuthOutcome {
        gate.evaluate(state, CredentialExtractor::new().extract(text)).await
    }

    #[tokio::test]
    async fn complete_credentials_verify() {
        let gate = gate(Arc::new(FixedVerifier::default()));
        let mut state = state();

        let outcome = submit(&gate, &mut state, "customer id 1111 pin 2222").await;

        assert!(outcome.verified_now());
        assert!(state.verified);
        assert_eq!(state.identity_id.as_deref(), Some("1111"));
        assert_eq!(state.auth_attempts, 0);
    }

    #[tokio::test]
    async fn solo_id_waits_for_pin_across_turns() {
        let verifier = Arc::new(FixedVerifier::default());
        let gate = gate(verifier.clone());
        let mut state = state();

        let first = submit(&gate, &mut state, "my customer id is 1111").await;
        assert!(first.needs_pin);
        assert!(!first.attempted);
        assert_eq!(first.credential_prompt(), prompts::NEED_PIN);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);

        let second = submit(&gate, &mut state, "2222").await;
        assert!(second.verified_now());
        assert!(state.pending_identity_id.is_none());
    }

    #[tokio::test]
    async fn solo_pin_waits_for_id() {
        let gate = gate(Arc::new(FixedVerifier::default()));
        let mut state = state();

        let first = submit(&gate, &mut state, "my pin is 2222").await;
        assert!(first.needs_id);
        assert_eq!(first.credential_prompt(), prompts::NEED_IDENTITY_ID);

        let second = submit(&gate, &mut state, "customer id 1111").await;
        assert!(second.verified_now());
        assert!(state.pending_pin.is_none());
    }

    #[tokio::test]
    async fn failures_count_down_then_lock() {
        let verifier = Arc::new(FixedVerifier::default());
        let gate = gate(verifier.clone());
        let mut state = state();

        let first = submit(&gate, &mut state, "id 1111 pin 9999").await;
        assert!(first.failed());
        assert_eq!(first.remaining_attempts, Some(2));

        submit(&gate, &mut state, "id 1111 pin 9998").await;
        let third = submit(&gate, &mut state, "id 1111 pin 9997").await;
        assert!(third.locked);
        assert!(state.locked);

        let after_lock = submit(&gate, &mut state, "id 1111 pin 2222").await;
        assert!(after_lock.locked);
        assert!(!state.verified);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn verified_session_short_circuits() {
        let verifier = Arc::new(FixedVerifier::default());
        let gate = gate(verifier.clone());
        let mut state = state();
        state.verified = true;

        let outcome = submit(&gate, &mut state, "id 1111 pin 0000").await;

        assert!(!outcome.attempted);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hung_verifier_does_not_consume_an_attempt() {
        let gate = gate(Arc::new(FixedVerifier { hang: true, ..FixedVerifier::default() }));
        let mut state = state();

        let outcome = submit(&gate, &mut state, "id 1111 pin 2222").await;

        assert!(outcome.unavailable);
        assert_eq!(state.auth_attempts, 0);
        assert!(!state.verified);
        assert_eq!(state.pending_identity_id.as_deref(), Some("1111"));
    }
}

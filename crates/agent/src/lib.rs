//! Dialogue orchestration for the Vaulta banking assistant.
//!
//! One customer utterance goes in, one reply comes out. In between, the
//! [`orchestrator::TurnOrchestrator`] runs a fixed pipeline:
//!
//! 1. **Small talk and escalation** (`smalltalk`) - answered without touching the flow
//! 2. **Authentication gate** (`auth_gate`) - merges credentials across turns, counts
//!    failures, locks the session after too many
//! 3. **Confirmation protocol** (`confirmation`) - interprets yes/no when an
//!    irreversible action is waiting for an answer
//! 4. **Dialogue router** (`router`) - sticky flows, keyword table, external classifier
//! 5. **Topic handlers** (`handlers`) - decide the reply and stage irreversible actions
//!
//! # Safety Principle
//!
//! Sensitive flows never reach their handler on an unverified session, and an
//! irreversible action only runs on a turn that began with the confirmation
//! prompt already outstanding.

pub mod auth_gate;
pub mod collaborators;
pub mod confirmation;
pub mod demo;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod router;
pub mod smalltalk;
pub mod turn;

pub use collaborators::{
    AccountDirectory, ActionExecutor, DisabledClassifier, IdentityVerifier, IntentClassifier,
};
pub use demo::DemoBank;
pub use orchestrator::{Collaborators, OrchestratorSettings, TurnOrchestrator, TurnReply};

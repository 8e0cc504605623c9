pub mod audit;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod redact;
pub mod session;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use credentials::{CredentialExtractor, ExtractedCredentials};
pub use domain::{ActionKind, FlowCategory, MessageRole, PendingAction, TurnMessage};
pub use errors::{ApplicationError, InterfaceError, TurnError};
pub use redact::{hash_identity_id, redact_sensitive_text};
pub use session::{
    FieldUpdate, ResetScope, Session, SessionPatch, SessionSnapshot, SessionStore, SweeperHandle,
};

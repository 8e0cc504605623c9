use thiserror::Error;

/// Failures a single turn can run into.
///
/// Only [`TurnError::VerificationRequired`] and [`TurnError::Internal`] leave
/// the orchestrator as errors; everything else is turned into a reply.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("confirmation attempted on an unverified session")]
    VerificationRequired,
    #[error("identity verification failed ({remaining_attempts} attempt(s) remaining)")]
    AuthenticationFailed { remaining_attempts: u32 },
    #[error("identity verification is locked for this session")]
    AccountLocked,
    #[error("action execution failed: {0}")]
    ActionExecutionFailed(String),
    #[error("intent classification unavailable: {0}")]
    ClassificationUnavailable(String),
    #[error("{collaborator} did not answer within the configured timeout")]
    CollaboratorTimeout { collaborator: &'static str },
    #[error("internal turn failure: {0}")]
    Internal(String),
}

impl TurnError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::VerificationRequired | Self::Internal(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::VerificationRequired => "verification_required",
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::AccountLocked => "account_locked",
            Self::ActionExecutionFailed(_) => "action_execution_failed",
            Self::ClassificationUnavailable(_) => "classification_unavailable",
            Self::CollaboratorTimeout { .. } => "collaborator_timeout",
            Self::Internal(_) => "internal",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, action: &'static str, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "Identity verification is required before this action.",
            Self::NotFound { .. } => "The requested session does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::Forbidden { .. } => "verification_required",
            Self::NotFound { .. } => "not_found",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Turn(TurnError::VerificationRequired) => Self::Forbidden {
                message: "verification required".to_owned(),
                action: "request_auth",
                correlation_id: unassigned(),
            },
            ApplicationError::Turn(TurnError::CollaboratorTimeout { collaborator }) => {
                Self::ServiceUnavailable {
                    message: format!("{collaborator} timed out"),
                    correlation_id: unassigned(),
                }
            }
            ApplicationError::Turn(error) => {
                Self::Internal { message: error.code().to_owned(), correlation_id: unassigned() }
            }
            ApplicationError::SessionNotFound(session_id) => {
                Self::NotFound { message: session_id, correlation_id: unassigned() }
            }
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, InterfaceError, TurnError};

    #[test]
    fn only_verification_and_internal_failures_are_fatal() {
        assert!(TurnError::VerificationRequired.is_fatal());
        assert!(TurnError::Internal("boom".to_owned()).is_fatal());
        assert!(!TurnError::AccountLocked.is_fatal());
        assert!(!TurnError::AuthenticationFailed { remaining_attempts: 2 }.is_fatal());
        assert!(!TurnError::ClassificationUnavailable("timeout".to_owned()).is_fatal());
    }

    #[test]
    fn verification_required_maps_to_forbidden_with_auth_action() {
        let interface =
            ApplicationError::from(TurnError::VerificationRequired).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Forbidden { action: "request_auth", ref correlation_id, .. }
                if correlation_id == "req-1"
        ));
        assert_eq!(interface.error_code(), "verification_required");
    }

    #[test]
    fn internal_turn_failure_does_not_leak_raw_text() {
        let interface = ApplicationError::from(TurnError::Internal(
            "verifier returned pin mismatch for 1234".to_owned(),
        ))
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Internal { ref message, .. } if message == "internal"));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn missing_session_maps_to_not_found() {
        let interface =
            ApplicationError::SessionNotFound("abc".to_owned()).into_interface("req-3");
        assert!(matches!(interface, InterfaceError::NotFound { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
    }
}

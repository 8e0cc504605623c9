use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Ingress,
    Auth,
    Routing,
    Confirmation,
    Session,
    System,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

/// An operator-facing record of something that happened to a session.
/// Metadata must never carry credentials or raw utterances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub session_id: String,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        session_id: impl Into<String>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|event| event.event_type == event_type).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Forwards audit events to the `tracing` pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            event_name = "audit.event",
            audit_event_id = %event.event_id,
            session_id = %event.session_id,
            correlation_id = %event.correlation_id,
            audit_event_type = %event.event_type,
            category = ?event.category,
            outcome = ?event.outcome,
            metadata = ?event.metadata,
            "audit event"
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEvent::new(
                "session-42",
                "req-123",
                "auth.verification_failed",
                AuditCategory::Auth,
                AuditOutcome::Rejected,
            )
            .with_metadata("remaining_attempts", "2"),
        );
        sink.emit(AuditEvent::new(
            "session-42",
            "req-124",
            "routing.flow_selected",
            AuditCategory::Routing,
            AuditOutcome::Success,
        ));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].session_id, "session-42");
        assert_eq!(events[0].metadata.get("remaining_attempts").map(String::as_str), Some("2"));
        assert_eq!(sink.events_of_type("routing.flow_selected").len(), 1);
    }
}

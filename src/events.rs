//! Domain events emitted on registration and account transitions.
//!
//! The notification collaborator consumes these out of process; this
//! subsystem only emits. The sink is injected so tests can capture events
//! instead of logging them.

use serde::Serialize;

use crate::models::RegistrationStatus;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A pending registration was submitted (free or manual-pay forms).
    RegistrationReceived {
        registration_id: String,
        form_id: String,
    },
    /// A registration became paid, either through the processor or through
    /// manual approval. Exactly one per settled registration.
    RegistrationPaid {
        registration_id: String,
        form_id: String,
        mentor_id: String,
        amount_cents: i64,
        currency: String,
    },
    /// An admin or mentor decided a pending registration.
    RegistrationDecided {
        registration_id: String,
        status: RegistrationStatus,
    },
    /// A mentor's connected account became ready to accept charges.
    MentorAccountReady { mentor_id: String },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DomainEvent);
}

/// Default sink: structured log lines for the notification pipeline to tail.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DomainEvent) {
        match serde_json::to_string(event) {
            Ok(json) => tracing::info!(target: "rollcall::events", "{}", json),
            Err(e) => tracing::error!("Failed to serialize domain event: {}", e),
        }
    }
}

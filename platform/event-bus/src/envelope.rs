//! # Event Envelope
//!
//! The immutable message shape carried over the bus for every pipeline stage.
//!
//! ## Envelope Fields
//!
//! - `event_id`: fresh per publish, echoed unchanged across retries of the same
//!   logical attempt.
//! - `occurred_at`: RFC3339 timestamp when the event was generated.
//! - `tenant_id`: multi-tenant isolation.
//! - `node`: the pipeline node (`A..G`) that owns this event.
//! - `event_name`: dotted string used for handler dispatch (e.g. `node_b.input`).
//! - `payload`: event-specific data (generic type parameter; wire form is JSON).
//! - `trace_id` / `run_id`: correlate every event belonging to one run.
//! - `idempotency_key`: deterministic, see [`crate::idemkeys`].
//! - `attempt`: starts at 0, bumped on each republish after a transient failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline node identifiers in the orchestration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeName {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl NodeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeName::A => "A",
            NodeName::B => "B",
            NodeName::C => "C",
            NodeName::D => "D",
            NodeName::E => "E",
            NodeName::F => "F",
            NodeName::G => "G",
        }
    }
}

impl std::str::FromStr for NodeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(NodeName::A),
            "B" => Ok(NodeName::B),
            "C" => Ok(NodeName::C),
            "D" => Ok(NodeName::D),
            "E" => Ok(NodeName::E),
            "F" => Ok(NodeName::F),
            "G" => Ok(NodeName::G),
            other => Err(format!("invalid node value: {other}")),
        }
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Standard event envelope carried over the main and dead-letter streams.
///
/// # Type Parameter
///
/// * `T` - the event-specific payload type, serialized as the wire `payload` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub tenant_id: Uuid,
    pub node: NodeName,
    pub event_name: String,
    pub trace_id: String,
    pub run_id: Uuid,
    pub idempotency_key: String,
    pub attempt: u32,
    pub payload: T,
}

impl<T> EventEnvelope<T> {
    /// Build a fresh envelope at `attempt = 0` with a new `event_id`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Uuid,
        node: NodeName,
        event_name: impl Into<String>,
        trace_id: impl Into<String>,
        run_id: Uuid,
        idempotency_key: impl Into<String>,
        payload: T,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            tenant_id,
            node,
            event_name: event_name.into(),
            trace_id: trace_id.into(),
            run_id,
            idempotency_key: idempotency_key.into(),
            attempt: 0,
            payload,
        }
    }

    /// Republish with the same identity (`event_id`, `idempotency_key`) but a
    /// bumped `attempt`, per the retry path in the consumer worker.
    pub fn with_attempt(&self, attempt: u32) -> Self
    where
        T: Clone,
    {
        Self {
            event_id: self.event_id,
            occurred_at: self.occurred_at,
            tenant_id: self.tenant_id,
            node: self.node,
            event_name: self.event_name.clone(),
            trace_id: self.trace_id.clone(),
            run_id: self.run_id,
            idempotency_key: self.idempotency_key.clone(),
            attempt,
            payload: self.payload.clone(),
        }
    }
}

/// Validate the required wire fields of a decoded envelope before it is handed
/// to the dispatcher. Mirrors the field checks the original decoder performs
/// ahead of constructing a typed `EventEnvelope`.
pub fn validate_envelope_fields(envelope: &serde_json::Value) -> Result<(), String> {
    envelope
        .get("event_id")
        .and_then(|v| v.as_str())
        .ok_or("missing or invalid event_id")?;

    envelope
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .ok_or("missing or invalid occurred_at")?;

    let tenant_id = envelope
        .get("tenant_id")
        .and_then(|v| v.as_str())
        .ok_or("missing or invalid tenant_id")?;
    if tenant_id.is_empty() {
        return Err("tenant_id cannot be empty".to_string());
    }

    let node = envelope
        .get("node")
        .and_then(|v| v.as_str())
        .ok_or("missing or invalid node")?;
    node.parse::<NodeName>()?;

    let event_name = envelope
        .get("event_name")
        .and_then(|v| v.as_str())
        .ok_or("missing or invalid event_name")?;
    if event_name.is_empty() {
        return Err("event_name cannot be empty".to_string());
    }

    envelope
        .get("idempotency_key")
        .and_then(|v| v.as_str())
        .ok_or("missing or invalid idempotency_key")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_carries_zero_attempt_by_default() {
        let envelope = EventEnvelope::new(
            Uuid::new_v4(),
            NodeName::B,
            "node_b.input",
            "trace-1",
            Uuid::new_v4(),
            "idem-1",
            json!({"foo": "bar"}),
        );
        assert_eq!(envelope.attempt, 0);
    }

    #[test]
    fn with_attempt_preserves_event_id_and_idempotency_key() {
        let envelope = EventEnvelope::new(
            Uuid::new_v4(),
            NodeName::B,
            "node_b.input",
            "trace-1",
            Uuid::new_v4(),
            "idem-1",
            json!({}),
        );
        let retried = envelope.with_attempt(1);
        assert_eq!(retried.event_id, envelope.event_id);
        assert_eq!(retried.idempotency_key, envelope.idempotency_key);
        assert_eq!(retried.attempt, 1);
    }

    #[test]
    fn validate_envelope_fields_rejects_missing_tenant_id() {
        let envelope = json!({
            "event_id": "550e8400-e29b-41d4-a716-446655440000",
            "occurred_at": "2024-01-01T00:00:00Z",
            "node": "A",
            "event_name": "node_a.brief_finalized",
            "idempotency_key": "k"
        });
        assert!(validate_envelope_fields(&envelope).is_err());
    }

    #[test]
    fn validate_envelope_fields_rejects_unknown_node() {
        let envelope = json!({
            "event_id": "550e8400-e29b-41d4-a716-446655440000",
            "occurred_at": "2024-01-01T00:00:00Z",
            "tenant_id": "tenant-123",
            "node": "Z",
            "event_name": "node_a.brief_finalized",
            "idempotency_key": "k"
        });
        assert!(validate_envelope_fields(&envelope).is_err());
    }

    #[test]
    fn validate_envelope_fields_accepts_well_formed_envelope() {
        let envelope = json!({
            "event_id": "550e8400-e29b-41d4-a716-446655440000",
            "occurred_at": "2024-01-01T00:00:00Z",
            "tenant_id": "tenant-123",
            "node": "A",
            "event_name": "node_a.brief_finalized",
            "idempotency_key": "k"
        });
        assert!(validate_envelope_fields(&envelope).is_ok());
    }
}

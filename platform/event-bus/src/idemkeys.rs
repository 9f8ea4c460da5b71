//! Deterministic idempotency key construction.
//!
//! A replay of the same logical step must reproduce the same key so the gate
//! blocks duplicate effects: deduplication is semantic, never message-identity
//! based.

use uuid::Uuid;

use crate::envelope::{EventEnvelope, NodeName};

/// Build the idempotency key carried on an envelope:
/// `"{tenant_id}:{run_id}:{node}:{event_name}:{step}"`.
///
/// `step` is a caller-chosen stable suffix — an influencer id, or a literal
/// like `finalize` — identifying the logical unit of work within the event.
pub fn make_idempotency_key(
    tenant_id: Uuid,
    run_id: Uuid,
    node: NodeName,
    event_name: &str,
    step: &str,
) -> String {
    format!("{tenant_id}:{run_id}:{node}:{event_name}:{step}")
}

/// Build the key-store key for an envelope's idempotency gate:
/// `"idem:{node}:{idempotency_key}"`.
pub fn build_idem_key<T>(envelope: &EventEnvelope<T>) -> String {
    format!("idem:{}:{}", envelope.node, envelope.idempotency_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_key() {
        let tenant_id = Uuid::new_v4();
        let run_id = Uuid::new_v4();
        let a = make_idempotency_key(tenant_id, run_id, NodeName::B, "node_b.input", "proceed:42");
        let b = make_idempotency_key(tenant_id, run_id, NodeName::B, "node_b.input", "proceed:42");
        assert_eq!(a, b);
    }

    #[test]
    fn different_steps_produce_different_keys() {
        let tenant_id = Uuid::new_v4();
        let run_id = Uuid::new_v4();
        let a = make_idempotency_key(tenant_id, run_id, NodeName::B, "node_b.input", "proceed:1");
        let b = make_idempotency_key(tenant_id, run_id, NodeName::B, "node_b.input", "proceed:2");
        assert_ne!(a, b);
    }
}

//! Conversion between a typed [`EventEnvelope`] and the flat string-field wire
//! shape stream messages actually carry: a flat map of string fields, all
//! values encoded as strings, with `payload` holding a JSON-encoded document.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::envelope::EventEnvelope;

/// Serialize an envelope to the wire field map.
pub fn to_fields<T: Serialize>(envelope: &EventEnvelope<T>) -> HashMap<String, String> {
    let mut fields = HashMap::with_capacity(10);
    fields.insert("event_id".to_string(), envelope.event_id.to_string());
    fields.insert("occurred_at".to_string(), envelope.occurred_at.to_rfc3339());
    fields.insert("tenant_id".to_string(), envelope.tenant_id.to_string());
    fields.insert("node".to_string(), envelope.node.to_string());
    fields.insert("event_name".to_string(), envelope.event_name.clone());
    fields.insert("trace_id".to_string(), envelope.trace_id.clone());
    fields.insert("run_id".to_string(), envelope.run_id.to_string());
    fields.insert(
        "idempotency_key".to_string(),
        envelope.idempotency_key.clone(),
    );
    fields.insert("attempt".to_string(), envelope.attempt.to_string());
    fields.insert(
        "payload".to_string(),
        serde_json::to_string(&envelope.payload).unwrap_or_default(),
    );
    fields
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid field {field}: {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Decode a wire field map into a typed envelope. Decode failures are
/// treated as garbage by the worker: ack and drop, never retried.
pub fn from_fields<T: DeserializeOwned>(
    fields: &HashMap<String, String>,
) -> Result<EventEnvelope<T>, DecodeError> {
    fn get<'a>(fields: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str, DecodeError> {
        fields
            .get(key)
            .map(|s| s.as_str())
            .ok_or(DecodeError::MissingField(key))
    }

    let event_id = get(fields, "event_id")?
        .parse::<Uuid>()
        .map_err(|e| DecodeError::InvalidField {
            field: "event_id",
            source: Box::new(e),
        })?;
    let occurred_at = chrono::DateTime::parse_from_rfc3339(get(fields, "occurred_at")?)
        .map_err(|e| DecodeError::InvalidField {
            field: "occurred_at",
            source: Box::new(e),
        })?
        .with_timezone(&chrono::Utc);
    let tenant_id = get(fields, "tenant_id")?
        .parse::<Uuid>()
        .map_err(|e| DecodeError::InvalidField {
            field: "tenant_id",
            source: Box::new(e),
        })?;
    let node = get(fields, "node")?
        .parse::<crate::envelope::NodeName>()
        .map_err(|e| DecodeError::InvalidField {
            field: "node",
            source: e.into(),
        })?;
    let event_name = get(fields, "event_name")?.to_string();
    let trace_id = get(fields, "trace_id")?.to_string();
    let run_id = get(fields, "run_id")?
        .parse::<Uuid>()
        .map_err(|e| DecodeError::InvalidField {
            field: "run_id",
            source: Box::new(e),
        })?;
    let idempotency_key = get(fields, "idempotency_key")?.to_string();
    let attempt = fields
        .get("attempt")
        .map(|s| s.parse::<u32>())
        .transpose()
        .map_err(|e| DecodeError::InvalidField {
            field: "attempt",
            source: Box::new(e),
        })?
        .unwrap_or(0);
    let payload = match fields.get("payload") {
        Some(raw) if !raw.is_empty() => {
            serde_json::from_str(raw).map_err(|e| DecodeError::InvalidField {
                field: "payload",
                source: Box::new(e),
            })?
        }
        _ => serde_json::from_str("null").map_err(|e| DecodeError::InvalidField {
            field: "payload",
            source: Box::new(e),
        })?,
    };

    Ok(EventEnvelope {
        event_id,
        occurred_at,
        tenant_id,
        node,
        event_name,
        trace_id,
        run_id,
        idempotency_key,
        attempt,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::NodeName;
    use serde_json::json;

    #[test]
    fn round_trips_through_the_wire_shape() {
        let envelope = EventEnvelope::new(
            Uuid::new_v4(),
            NodeName::B,
            "node_b.input",
            "trace-1",
            Uuid::new_v4(),
            "idem-1",
            json!({"campaign_id": "abc"}),
        );
        let fields = to_fields(&envelope);
        let decoded: EventEnvelope<serde_json::Value> = from_fields(&fields).unwrap();
        assert_eq!(decoded.event_id, envelope.event_id);
        assert_eq!(decoded.tenant_id, envelope.tenant_id);
        assert_eq!(decoded.idempotency_key, envelope.idempotency_key);
        assert_eq!(decoded.payload, envelope.payload);
    }

    #[test]
    fn missing_tenant_id_is_a_decode_error() {
        let mut fields = HashMap::new();
        fields.insert("event_id".to_string(), Uuid::new_v4().to_string());
        let decoded = from_fields::<serde_json::Value>(&fields);
        assert!(decoded.is_err());
    }
}

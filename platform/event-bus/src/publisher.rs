//! Stream publisher: appends envelopes to the main or dead-letter stream,
//! wrapping a bus client behind a small typed surface rather than exposing
//! raw `publish` calls everywhere.

use serde::Serialize;
use std::sync::Arc;

use crate::bus::{BusResult, StreamBus};
use crate::constants::{STREAM_DLQ, STREAM_MAIN};
use crate::envelope::EventEnvelope;
use crate::envelope_fields::to_fields;

#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn StreamBus>,
}

impl Publisher {
    pub fn new(bus: Arc<dyn StreamBus>) -> Self {
        Self { bus }
    }

    /// Append the envelope to the main stream. Publish failure propagates to
    /// the caller; the worker must be prepared for this to fail and leave
    /// the triggering message un-acked.
    pub async fn publish<T: Serialize>(&self, envelope: &EventEnvelope<T>) -> BusResult<String> {
        self.bus.publish(STREAM_MAIN, to_fields(envelope)).await
    }

    /// Append the envelope to the dead-letter stream with the two extra
    /// fields `error` and `dlq_reason`.
    pub async fn publish_dlq<T: Serialize>(
        &self,
        envelope: &EventEnvelope<T>,
        error: &str,
    ) -> BusResult<String> {
        let mut fields = to_fields(envelope);
        fields.insert("error".to_string(), error.to_string());
        fields.insert("dlq_reason".to_string(), "max_retries_exceeded".to_string());
        self.bus.publish(STREAM_DLQ, fields).await
    }
}

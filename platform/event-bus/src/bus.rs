//! Core stream-bus abstraction: append-only, consumer-group-leased streams.
//!
//! Unlike a broadcast pub/sub bus, every message is leased to exactly one
//! consumer within a named group at a time. The trait is kept object-safe by
//! moving serialization to the edges: callers hand the bus a flat
//! `HashMap<String, String>` wire shape rather than a generic envelope.

use std::collections::HashMap;

use async_trait::async_trait;

/// A message leased from a consumer group, not yet acknowledged.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    /// Broker-assigned message id, opaque to callers, used only for `ack`.
    pub id: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to publish message: {0}")]
    Publish(String),

    #[error("failed to read from stream: {0}")]
    Read(String),

    #[error("failed to ack message: {0}")]
    Ack(String),

    #[error("failed to create consumer group: {0}")]
    GroupCreate(String),

    #[error("connection error: {0}")]
    Connection(String),
}

pub type BusResult<T> = Result<T, BusError>;

/// Log-structured append-only stream bus with consumer-group semantics.
#[async_trait]
pub trait StreamBus: Send + Sync {
    /// Ensure a named consumer group exists on `stream`, creating the stream
    /// if absent. Idempotent: calling this for an already-existing group is a
    /// no-op, not an error.
    async fn ensure_group(&self, stream: &str, group: &str) -> BusResult<()>;

    /// Append `fields` to `stream`. Returns the broker-assigned message id.
    async fn publish(&self, stream: &str, fields: HashMap<String, String>) -> BusResult<String>;

    /// Read up to `count` pending messages for `consumer` in `group`, blocking
    /// up to `block_ms` milliseconds if none are immediately available.
    /// An empty result means the block elapsed with nothing new.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: usize,
    ) -> BusResult<Vec<StreamMessage>>;

    /// Acknowledge a message, releasing its lease.
    async fn ack(&self, stream: &str, group: &str, message_id: &str) -> BusResult<()>;
}

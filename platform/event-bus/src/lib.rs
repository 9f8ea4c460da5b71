//! # Event bus
//!
//! The durable, log-structured event bus the orchestrator is built on:
//! envelopes, deterministic idempotency keys, a consumer-group stream
//! abstraction with a Redis-backed production implementation and an
//! in-memory test twin, the idempotency key store, and backoff for the
//! consumer worker's retry path.
//!
//! ## Implementations
//!
//! - [`RedisStreamBus`] / [`RedisKeyStore`] — production, backed by Redis
//!   Streams and a Redis TTL key.
//! - [`InMemoryStreamBus`] / [`InMemoryKeyStore`] — deterministic in-process
//!   twins for tests.

mod backoff;
mod bus;
mod constants;
mod envelope;
mod envelope_fields;
mod idemkeys;
mod inmemory_bus;
mod keystore;
mod publisher;
mod redis_bus;

pub use backoff::calculate_backoff;
pub use bus::{BusError, BusResult, StreamBus, StreamMessage};
pub use constants::*;
pub use envelope::{validate_envelope_fields, EventEnvelope, NodeName};
pub use envelope_fields::{from_fields, to_fields, DecodeError};
pub use idemkeys::{build_idem_key, make_idempotency_key};
pub use inmemory_bus::InMemoryStreamBus;
pub use keystore::{InMemoryKeyStore, KeyStore, KeyStoreError, KeyStoreResult, RedisKeyStore};
pub use publisher::Publisher;
pub use redis_bus::RedisStreamBus;

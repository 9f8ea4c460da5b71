//! The stream consumer worker: the hardest single component in the system.
//! Consumer-group lease, decode, idempotency gate, dispatch, and the three
//! terminal paths (success, budget-exceeded, transient-retry/DLQ). Mirrors
//! `start_gl_posting_consumer`'s spawn/loop shape
//! (`src/consumer/gl_posting_consumer.rs`), adapted from its NATS
//! subscription to this bus's consumer-group read/ack pair.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use event_bus::{
    build_idem_key, calculate_backoff, EventEnvelope, KeyStore, Publisher, StreamBus,
    BLOCK_MS, COUNT, GROUP_NAME, IDEM_TTL_SECONDS, MAX_RETRIES, STREAM_MAIN,
};

use crate::handlers::{HandlerContext, HandlerError, Registry};
use crate::repos::run_repo;
use crate::services::budget::{Budget, BudgetState};
use crate::services::ledger::CostLedger;
use crate::services::pulse::PulseChecker;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to ensure consumer group: {0}")]
    GroupSetup(#[from] event_bus::BusError),
}

/// Per-run budget state, created lazily and keyed by `(tenant_id, run_id)`.
/// Worker-local, a soft estimate rather than the authoritative ledger total.
type BudgetStates = StdMutex<HashMap<(Uuid, Uuid), Arc<Mutex<BudgetState>>>>;

pub struct Worker {
    bus: Arc<dyn StreamBus>,
    key_store: Arc<dyn KeyStore>,
    pool: PgPool,
    ledger: Arc<dyn CostLedger>,
    budget: Arc<Budget>,
    registry: Arc<Registry>,
    pulse_checker: Arc<PulseChecker>,
    consumer_name: String,
    budget_states: BudgetStates,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: Arc<dyn StreamBus>,
        key_store: Arc<dyn KeyStore>,
        pool: PgPool,
        ledger: Arc<dyn CostLedger>,
        budget: Arc<Budget>,
        registry: Arc<Registry>,
        pulse_checker: Arc<PulseChecker>,
        consumer_name: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            key_store,
            pool,
            ledger,
            budget,
            registry,
            pulse_checker,
            consumer_name: consumer_name.into(),
            budget_states: StdMutex::new(HashMap::new()),
        }
    }

    fn budget_state_for(&self, tenant_id: Uuid, run_id: Uuid) -> Arc<Mutex<BudgetState>> {
        self.budget_states
            .lock()
            .unwrap()
            .entry((tenant_id, run_id))
            .or_insert_with(|| Arc::new(Mutex::new(BudgetState::default())))
            .clone()
    }

    /// The read loop. Exits after the current batch once
    /// `stop` is set, or after `stop_after` batches have been read (test
    /// determinism) — whichever comes first. `stop_after = None` runs
    /// forever (production).
    pub async fn run(&self, stop: Arc<AtomicBool>, stop_after: Option<usize>) -> Result<(), WorkerError> {
        self.bus.ensure_group(STREAM_MAIN, GROUP_NAME).await?;

        let mut batches_read = 0usize;
        loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if let Some(limit) = stop_after {
                if batches_read >= limit {
                    break;
                }
            }

            let messages = match self
                .bus
                .read_group(STREAM_MAIN, GROUP_NAME, &self.consumer_name, COUNT, BLOCK_MS)
                .await
            {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::error!(error = %err, "failed to read from stream");
                    continue;
                }
            };
            batches_read += 1;

            for message in messages {
                self.process_message(message).await;
            }
        }

        Ok(())
    }

    async fn process_message(&self, message: event_bus::StreamMessage) {
        let envelope: EventEnvelope<serde_json::Value> =
            match event_bus::from_fields(&message.fields) {
                Ok(envelope) => envelope,
                Err(err) => {
                    tracing::warn!(error = %err, message_id = %message.id, "dropping undecodable message");
                    self.ack(&message.id).await;
                    return;
                }
            };

        let idem_key = build_idem_key(&envelope);
        match self.key_store.exists(&idem_key).await {
            Ok(true) => {
                tracing::debug!(idempotency_key = %envelope.idempotency_key, "duplicate, skipping");
                self.ack(&message.id).await;
                return;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(error = %err, "key store unavailable, leaving message unacked");
                return;
            }
        }

        let Some(handler) = self.registry.get(&envelope.event_name) else {
            tracing::warn!(event_name = %envelope.event_name, "no handler registered, dropping");
            self.ack(&message.id).await;
            return;
        };

        let budget_state = self.budget_state_for(envelope.tenant_id, envelope.run_id);
        let ctx = HandlerContext {
            fields: message.fields.clone(),
            pool: self.pool.clone(),
            bus: self.bus.clone(),
            ledger: self.ledger.clone(),
            budget: self.budget.clone(),
            budget_state,
            pulse_checker: self.pulse_checker.clone(),
        };

        match handler.handle(ctx).await {
            Ok(()) => {
                if let Err(err) = self.key_store.set_with_ttl(&idem_key, IDEM_TTL_SECONDS).await {
                    tracing::error!(error = %err, "failed to record idempotency key after success");
                }
                self.ack(&message.id).await;
            }
            Err(HandlerError::Budget(budget_exceeded)) => {
                tracing::error!(error = %budget_exceeded, "budget exceeded, failing run");
                if let Err(err) = self.fail_run(&envelope, &budget_exceeded.to_string()).await {
                    tracing::error!(error = %err, "failed to write run as failed after budget exceeded");
                }
                self.ack(&message.id).await;
            }
            Err(other) => {
                self.retry_or_dlq(&envelope, &message.id, other).await;
            }
        }
    }

    async fn fail_run(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        run_repo::fail(&mut tx, envelope.tenant_id, envelope.run_id, message)
            .await
            .map_err(|e| match e {
                run_repo::RunError::Database(e) => e,
                run_repo::RunError::NotFound { .. } => sqlx::Error::RowNotFound,
            })?;
        tx.commit().await
    }

    async fn retry_or_dlq(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
        message_id: &str,
        error: HandlerError,
    ) {
        let next_attempt = envelope.attempt + 1;
        let publisher = Publisher::new(self.bus.clone());

        if next_attempt < MAX_RETRIES {
            tracing::warn!(
                error = %error,
                attempt = next_attempt,
                "handler failed, scheduling retry"
            );
            tokio::time::sleep(calculate_backoff(next_attempt)).await;
            let retried = envelope.with_attempt(next_attempt);
            if let Err(publish_err) = publisher.publish(&retried).await {
                tracing::error!(error = %publish_err, "failed to republish for retry, leaving unacked");
                return;
            }
        } else {
            tracing::error!(error = %error, "handler failed, exhausted retries, sending to DLQ");
            if let Err(publish_err) = publisher.publish_dlq(envelope, &error.to_string()).await {
                tracing::error!(error = %publish_err, "failed to publish to DLQ, leaving unacked");
                return;
            }
        }

        self.ack(message_id).await;
    }

    async fn ack(&self, message_id: &str) {
        if let Err(err) = self.bus.ack(STREAM_MAIN, GROUP_NAME, message_id).await {
            tracing::error!(error = %err, message_id = %message_id, "failed to ack message");
        }
    }
}

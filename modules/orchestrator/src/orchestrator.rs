//! The orchestrator: run bootstrap and completion polling, the same
//! two-operation surface as `start_run`/`await_completion`, backed by the
//! typed `run_repo`/`campaign_repo` and `DossierResult` instead of bare
//! dict/row access.

use std::time::Duration;

use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use event_bus::{make_idempotency_key, EventEnvelope, NodeName, Publisher, StreamBus, EVENT_BRIEF_FINALIZED};

use crate::contracts::{BriefFinalizedPayload, CampaignBrief, RunStatus};
use crate::repos::{campaign_repo, run_repo};
use crate::run_models::DossierResult;

const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_MAX_POLL_ITERATIONS: u32 = 600;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Run(#[from] run_repo::RunError),

    #[error(transparent)]
    Campaign(#[from] campaign_repo::CampaignError),

    #[error(transparent)]
    Bus(#[from] event_bus::BusError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct Orchestrator {
    pool: PgPool,
    bus: Arc<dyn StreamBus>,
}

impl Orchestrator {
    pub fn new(pool: PgPool, bus: Arc<dyn StreamBus>) -> Self {
        Self { pool, bus }
    }

    /// Creates the run and campaign rows, links them, and publishes
    /// `node_a.brief_finalized` with idempotency step `brief_finalized`.
    pub async fn start_run(
        &self,
        tenant_id: Uuid,
        trace_id: impl Into<String>,
        brief: CampaignBrief,
    ) -> Result<Uuid, OrchestratorError> {
        let trace_id = trace_id.into();
        let run_id = Uuid::new_v4();
        let campaign_id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;
        run_repo::insert_running(&mut tx, run_id, tenant_id, &trace_id).await?;
        campaign_repo::insert(&mut tx, campaign_id, tenant_id, &trace_id, run_id, &brief).await?;
        run_repo::link_campaign(&mut tx, tenant_id, run_id, campaign_id).await?;
        tx.commit().await?;

        let payload = BriefFinalizedPayload { campaign_id, brief };
        let idempotency_key =
            make_idempotency_key(tenant_id, run_id, NodeName::A, EVENT_BRIEF_FINALIZED, "brief_finalized");
        let envelope = EventEnvelope::new(
            tenant_id,
            NodeName::A,
            EVENT_BRIEF_FINALIZED,
            trace_id,
            run_id,
            idempotency_key,
            payload,
        );
        Publisher::new(self.bus.clone()).publish(&envelope).await?;

        Ok(run_id)
    }

    /// Polls the run row until it reaches a terminal status, `max_poll_iterations`
    /// is exhausted, or `timeout` elapses — whichever comes first. A timeout
    /// synthesizes a `failed` [`DossierResult`], never a real row.
    pub async fn await_completion(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
        trace_id: impl Into<String>,
        timeout: Duration,
    ) -> DossierResult {
        let trace_id = trace_id.into();
        let poll_interval = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);
        let deadline = tokio::time::Instant::now() + timeout;

        for _ in 0..DEFAULT_MAX_POLL_ITERATIONS {
            match run_repo::find_by_id(&self.pool, tenant_id, run_id).await {
                Ok(Some(run)) if matches!(run.status, RunStatus::Completed | RunStatus::Failed) => {
                    return DossierResult::from_run(&run);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "await_completion: failed to poll run row");
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }

        DossierResult::timeout(tenant_id, run_id, trace_id)
    }
}

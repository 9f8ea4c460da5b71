//! Stage A: turns a finalized brief into Stage B's input, or
//! short-circuits the run to `completed` with zero targets when the brief
//! carries no query embedding. The campaign row itself is already written by
//! `Orchestrator::start_run` before this event is ever published — this
//! handler only derives the next step from what it's handed.

use event_bus::{make_idempotency_key, EventEnvelope, NodeName, Publisher};

use crate::contracts::payloads::{BriefFinalizedPayload, NodeBInputPayload};
use crate::repos::run_repo;
use crate::run_models::ResultJson;
use crate::services::budget::budget_guard;
use crate::services::ledger::CostEntry;
use crate::services::stage_b::DEFAULT_DESIRED_COUNT;

use super::context::{HandlerContext, HandlerError};
use super::registry::Handler;

pub struct NodeAHandler;

#[async_trait::async_trait]
impl Handler for NodeAHandler {
    async fn handle(&self, ctx: HandlerContext) -> Result<(), HandlerError> {
        let envelope: EventEnvelope<BriefFinalizedPayload> = event_bus::from_fields(&ctx.fields)?;
        let tenant_id = envelope.tenant_id;
        let run_id = envelope.run_id;
        let campaign_id = envelope.payload.campaign_id;

        {
            let mut budget_state = ctx.budget_state.lock().await;
            budget_guard(&ctx.budget, &budget_state, 0.0, Some("internal"), 1)?;
            ctx.ledger.record(CostEntry::new(
                tenant_id,
                &envelope.trace_id,
                run_id,
                NodeName::A,
                "internal",
                "brief_validate",
                0.0,
                1.0,
            ));
            budget_state.dollars_spent += 0.0;
            *budget_state
                .provider_calls
                .entry("internal".to_string())
                .or_insert(0) += 1;
        }

        let mut tx = ctx.pool.begin().await?;

        let Some(query_embedding_id) = envelope.payload.brief.query_embedding_id else {
            let result = ResultJson::zero_targets("brief carries no query embedding");
            run_repo::complete(
                &mut tx,
                tenant_id,
                run_id,
                serde_json::to_value(&result).expect("ResultJson always serializes"),
            )
            .await?;
            tx.commit().await?;
            return Ok(());
        };

        let payload = NodeBInputPayload {
            campaign_id,
            query_embedding_id: Some(query_embedding_id),
            limit: DEFAULT_DESIRED_COUNT,
        };
        let idempotency_key =
            make_idempotency_key(tenant_id, run_id, NodeName::A, event_bus::EVENT_NODE_B_INPUT, "forward");
        let out = EventEnvelope::new(
            tenant_id,
            NodeName::A,
            event_bus::EVENT_NODE_B_INPUT,
            envelope.trace_id.clone(),
            run_id,
            idempotency_key,
            payload,
        );

        tx.commit().await?;

        let publisher = Publisher::new(ctx.bus.clone());
        publisher.publish(&out).await?;

        Ok(())
    }
}
